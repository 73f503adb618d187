//! Terminal output for the CLI
//!
//! Uses `cliclack` when attached to an interactive terminal and plain,
//! tag-prefixed lines otherwise (CI, pipes, `--format json`).

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, remark, section, step_info, step_ok,
    step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
