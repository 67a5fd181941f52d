pub mod contact;
pub mod enrollment;
pub mod errors;
pub mod kitchen;
pub mod logging;
pub mod site;
pub mod site_config;
