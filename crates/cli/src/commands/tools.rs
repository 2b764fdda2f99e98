//! Tools Command

use crate::output::print_json;
use crate::tools::tool_definitions;

/// Print every tool with its argument schema
pub fn execute() -> bool {
    print_json(&tool_definitions());
    true
}
