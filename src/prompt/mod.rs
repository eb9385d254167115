//! Prompt Composer.
//!
//! Renders the PSVS position into three Markdown sections (policy, value,
//! search) and wraps them with the avatar identity and client goals into a
//! single system prompt. Pure string building; nothing here can fail.

pub mod composer;
pub mod policy;
pub mod search;
pub mod value;

pub use composer::{compose, AvatarInfo, ProfileInfo};
pub use policy::render_policy;
pub use search::render_search;
pub use value::render_value;
