//! Flow-fact file parser (`spec.md` §6): loop bounds, do-not-inline
//! calls, indirect-branch targets, and return-site declarations, all
//! keyed by address since the file is read before any CFG exists.
//!
//! Line-oriented like the teacher's linker-script parser
//! (`gcrecomp-core/src/recompiler/linker.rs`): comments and blank lines
//! are skipped, each remaining line is tokenized on whitespace and
//! matched on its first word. Unknown directives are reported as
//! warnings rather than failing the whole file; a line that starts with
//! a known directive but doesn't parse is fatal.

use std::collections::{HashMap, HashSet};

use crate::cfg::builder::BuilderInputs;
use crate::error::{OtawaError, Result};
use crate::ipet::LoopBound;
use crate::program::Address;

/// The result of parsing one flow-fact file.
#[derive(Debug, Clone, Default)]
pub struct FlowFacts {
    pub loop_bounds: HashMap<Address, LoopBound>,
    pub ignored_calls: HashSet<Address>,
    pub branch_targets: HashMap<Address, Address>,
    pub returns: HashSet<Address>,
    /// Non-fatal problems: unknown directives, named by line number.
    pub warnings: Vec<String>,
}

impl FlowFacts {
    /// Project the address-keyed facts the CFG builder needs
    /// (`branch`/`call .. ignore`/`return`) into its own input shape.
    /// `loop_bounds` is consumed separately, once block addresses have
    /// been resolved to [`crate::cfg::BlockId`]s by the built CFG.
    pub fn builder_inputs(&self) -> BuilderInputs {
        let mut resolved_indirect: HashMap<u64, Vec<Address>> = HashMap::new();
        for (&source, &target) in &self.branch_targets {
            if let Some(addr) = source.value() {
                resolved_indirect.entry(addr).or_default().push(target);
            }
        }
        BuilderInputs {
            resolved_indirect,
            do_not_inline_calls: self.ignored_calls.iter().filter_map(|a| a.value()).collect(),
            forced_returns: self.returns.iter().filter_map(|a| a.value()).collect(),
        }
    }
}

/// Parse a flow-fact file's contents. `line` numbers in errors are
/// 1-based, matching the file as a human would point at it in an editor.
pub fn parse(content: &str) -> Result<FlowFacts> {
    let mut facts = FlowFacts::default();

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let directive = tokens[0];
        match directive {
            "loop" => match tokens.as_slice() {
                ["loop", addr, bound] => {
                    let header = parse_address(addr, line_no, line)?;
                    let max_per_entry = parse_int(bound, line_no, line)?;
                    facts.loop_bounds.insert(header, LoopBound { max_per_entry, total: None });
                }
                ["loop", addr, "max", max_bound, "total", total_bound] => {
                    let header = parse_address(addr, line_no, line)?;
                    let max_per_entry = parse_int(max_bound, line_no, line)?;
                    let total = parse_int(total_bound, line_no, line)?;
                    facts.loop_bounds.insert(header, LoopBound { max_per_entry, total: Some(total) });
                }
                _ => return Err(malformed(line_no, line)),
            },
            "call" => match tokens.as_slice() {
                ["call", addr, "ignore"] => {
                    facts.ignored_calls.insert(parse_address(addr, line_no, line)?);
                }
                _ => return Err(malformed(line_no, line)),
            },
            "branch" => match tokens.as_slice() {
                ["branch", addr, target] => {
                    let source = parse_address(addr, line_no, line)?;
                    let target = parse_address(target, line_no, line)?;
                    facts.branch_targets.insert(source, target);
                }
                _ => return Err(malformed(line_no, line)),
            },
            "return" => match tokens.as_slice() {
                ["return", addr] => {
                    facts.returns.insert(parse_address(addr, line_no, line)?);
                }
                _ => return Err(malformed(line_no, line)),
            },
            other => {
                facts.warnings.push(format!("line {line_no}: unknown directive '{other}'"));
            }
        }
    }

    Ok(facts)
}

fn parse_address(token: &str, line: usize, text: &str) -> Result<Address> {
    let hex = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).ok_or_else(|| malformed(line, text))?;
    let value = u64::from_str_radix(hex, 16).map_err(|_| malformed(line, text))?;
    Ok(Address::new(value))
}

fn parse_int(token: &str, line: usize, text: &str) -> Result<i64> {
    token.parse::<i64>().map_err(|_| malformed(line, text))
}

fn malformed(line: usize, text: &str) -> OtawaError {
    OtawaError::MalformedFlowFact { line, text: text.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_loop_bound() {
        let facts = parse("loop 0x1000 10\n").unwrap();
        let bound = facts.loop_bounds[&Address::new(0x1000)];
        assert_eq!(bound.max_per_entry, 10);
        assert_eq!(bound.total, None);
    }

    #[test]
    fn parses_a_max_total_loop_bound() {
        let facts = parse("loop 0x2000 max 5 total 40\n").unwrap();
        let bound = facts.loop_bounds[&Address::new(0x2000)];
        assert_eq!(bound.max_per_entry, 5);
        assert_eq!(bound.total, Some(40));
    }

    #[test]
    fn parses_calls_branches_and_returns() {
        let facts = parse("call 0x3000 ignore\nbranch 0x3010 0x4000\nreturn 0x3020\n").unwrap();
        assert!(facts.ignored_calls.contains(&Address::new(0x3000)));
        assert_eq!(facts.branch_targets[&Address::new(0x3010)], Address::new(0x4000));
        assert!(facts.returns.contains(&Address::new(0x3020)));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let facts = parse("# a comment\n\nloop 0x1000 1\n").unwrap();
        assert_eq!(facts.loop_bounds.len(), 1);
    }

    #[test]
    fn unknown_directive_is_a_warning_not_an_error() {
        let facts = parse("frobnicate 0x1000\n").unwrap();
        assert_eq!(facts.loop_bounds.len(), 0);
        assert_eq!(facts.warnings.len(), 1);
    }

    #[test]
    fn builder_inputs_projects_branch_call_and_return_facts() {
        let facts = parse("call 0x3000 ignore\nbranch 0x3010 0x4000\nreturn 0x3020\n").unwrap();
        let inputs = facts.builder_inputs();
        assert_eq!(inputs.resolved_indirect[&0x3010], vec![Address::new(0x4000)]);
        assert!(inputs.do_not_inline_calls.contains(&0x3000));
        assert!(inputs.forced_returns.contains(&0x3020));
    }

    #[test]
    fn non_hex_address_is_fatal() {
        let err = parse("loop 1000 10\n").unwrap_err();
        assert!(matches!(err, OtawaError::MalformedFlowFact { line: 1, .. }));
    }

    #[test]
    fn missing_bound_is_fatal() {
        let err = parse("loop 0x1000\n").unwrap_err();
        assert!(matches!(err, OtawaError::MalformedFlowFact { .. }));
    }
}
