pub mod oauth;
pub mod orders;
