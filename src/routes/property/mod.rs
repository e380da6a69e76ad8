mod handler;
mod model;

pub use handler::{
    CACHE_STATUS_HEADER, create_property, delete_property, update_property, view_properties,
};
pub use model::{Property, PropertyListing};
