pub mod output;

pub use output::{
    display_answer, display_banner, display_error, display_event, display_tools, prompt,
};
