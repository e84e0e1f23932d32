pub mod core;
pub use self::core::{
    CompletionClient, CompletionError, CompletionService, FragmentStream, Message, Role,
};

pub mod models;
pub use models::{ModelListing, ModelListingError, list_models};
