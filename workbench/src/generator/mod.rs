pub mod phantom;
pub mod profile;
pub mod template;
