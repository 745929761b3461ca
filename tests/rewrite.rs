#[path = "rewrite/properties.rs"]
mod properties;
#[path = "rewrite/surfaces.rs"]
mod surfaces;
