//! User domain module.
//!
//! # Module Structure
//!
//! - `model`: Cumulative participant record (`UserProfile`)
//! - `profiles`: Profile access over the document store (`UserProfiles`)

mod model;
mod profiles;

pub use model::{USERS_COLLECTION, UserProfile, profile_field};
pub use profiles::UserProfiles;
