pub mod api;
pub mod cli;
pub mod registry;
pub mod resource;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;
