pub mod project;

pub use project::{collect_inputs, parse_name_list, Config};
