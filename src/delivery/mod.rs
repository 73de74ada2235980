pub mod links_api;
pub mod objects;
pub mod public;
pub mod redirect;
pub mod response;
pub mod router;
