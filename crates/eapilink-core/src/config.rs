// Running-config block extraction.
//
// The device's configuration language has no braces or end markers:
// indentation is the sole structural signal. A block is a top-level
// statement line plus every line indented under it.

use std::sync::LazyLock;

use eapilink_api::Error;
use regex::Regex;

// A line whose first character is non-whitespace starts a new top-level
// statement. Blank lines have no first character, so they never terminate
// a block.
static NEXT_TOP_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[^\s]").expect("static pattern"));

/// Extract the config block belonging to a top-level statement.
///
/// `statement` is matched as a whole anchored line. It is treated as a
/// regular expression without escaping, so a statement containing regex
/// metacharacters must be escaped by the caller -- an unescaped one can
/// match the wrong line. An invalid pattern is an argument error; a
/// statement that simply is not present returns `Ok(None)`, since absence
/// of a block is a normal outcome resource modules must handle.
///
/// The returned slice runs from the start of the matched line up to (but
/// excluding) the next top-level line, or to the end of the text, with
/// internal newlines and indentation preserved verbatim.
pub fn get_block<'a>(config: &'a str, statement: &str) -> Result<Option<&'a str>, Error> {
    let anchored =
        Regex::new(&format!("(?m)^{statement}$")).map_err(|e| Error::InvalidArgument {
            message: format!("invalid block statement pattern: {e}"),
        })?;

    let Some(found) = anchored.find(config) else {
        return Ok(None);
    };

    let tail = &config[found.end()..];
    let block_end = match NEXT_TOP_LEVEL.find(tail) {
        Some(next) => found.end() + next.start(),
        None => config.len(),
    };

    Ok(Some(&config[found.start()..block_end]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const CONFIG: &str = "interface Ethernet1\n   description x\n   no shutdown\ninterface Ethernet2\n";

    #[test]
    fn block_excludes_the_following_top_level_line() {
        let block = get_block(CONFIG, "interface Ethernet1").unwrap().unwrap();
        assert_eq!(block, "interface Ethernet1\n   description x\n   no shutdown\n");
    }

    #[test]
    fn statement_with_no_children_yields_only_its_own_line() {
        let config = "interface Ethernet1\ninterface Ethernet2\n   description y\n";
        let block = get_block(config, "interface Ethernet1").unwrap().unwrap();
        assert_eq!(block, "interface Ethernet1\n");
    }

    #[test]
    fn block_at_end_of_text_runs_to_the_end() {
        let block = get_block(CONFIG, "interface Ethernet2").unwrap().unwrap();
        assert_eq!(block, "interface Ethernet2\n");

        let config = "interface Ethernet9\n   description z";
        let block = get_block(config, "interface Ethernet9").unwrap().unwrap();
        assert_eq!(block, "interface Ethernet9\n   description z");
    }

    #[test]
    fn missing_statement_reports_absence_not_an_error() {
        assert_eq!(get_block(CONFIG, "interface Ethernet7").unwrap(), None);
    }

    #[test]
    fn blank_lines_inside_a_block_do_not_terminate_it() {
        let config = "vlan 100\n   name test\n\n   state active\nvlan 200\n";
        let block = get_block(config, "vlan 100").unwrap().unwrap();
        assert_eq!(block, "vlan 100\n   name test\n\n   state active\n");
    }

    #[test]
    fn partial_line_matches_are_not_blocks() {
        // The statement is anchored at both ends of the line.
        assert_eq!(get_block(CONFIG, "interface Ethernet").unwrap(), None);
    }

    #[test]
    fn invalid_pattern_is_an_argument_error() {
        let err = get_block(CONFIG, "interface Ethernet[").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }), "got: {err:?}");
    }
}
