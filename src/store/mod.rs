mod action_store;

pub use action_store::ActionStore;
