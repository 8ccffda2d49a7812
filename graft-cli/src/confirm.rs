//! Interactive confirmation on stderr, so stdout stays clean for text
//! exports.

use anyhow::Result;
use graft::NodeInfo;
use std::io::{self, BufRead, Write};

pub struct Prompt {
    assume_yes: bool,
}

impl Prompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    /// Ask a yes/no question. Anything but an explicit yes is a no.
    pub fn confirm(&self, question: &str) -> Result<bool> {
        if self.assume_yes {
            eprintln!("{} [y/N] y", question);
            return Ok(true);
        }
        eprint!("{} [y/N] ", question);
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(is_yes(&input))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Root-to-node listing, one indented line per node, the last one marked.
pub fn render_path(nodes: &[NodeInfo], marker: &str) -> String {
    let mut out = String::new();
    for (depth, node) in nodes.iter().enumerate() {
        out.push_str(&"  ".repeat(depth));
        if depth + 1 == nodes.len() {
            out.push_str(marker);
            out.push(' ');
        }
        out.push_str(&format!("{} ({})\n", node.label, node.node_type));
    }
    out
}
