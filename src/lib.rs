// Omniclass: Multiple-Dispatch Object Model
//
// Classes with typed, validated properties, and generic functions whose
// behavior is selected by the runtime classes of one or more arguments,
// with a fallback path into the host's legacy single-dispatch systems.

pub mod errors;
pub mod value;
pub mod class;
pub mod property;
pub mod object;
pub mod registry;
pub mod generic;
pub mod dispatch;
pub mod deferred;
pub mod printer;
