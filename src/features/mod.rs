pub mod dependency;
pub mod probe;
pub mod results;
pub mod template;
