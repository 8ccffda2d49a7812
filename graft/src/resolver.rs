//! Resolution of path-or-identifier input to store nodes.

use tracing::debug;

use crate::address::{normalize, Address};
use crate::codec::{NodeInfo, RootContext, TreeCodec};
use crate::error::{Error, Result};

/// Which root container a lookup happens in.
#[derive(Debug, Clone, Copy)]
pub enum RootSelector<'a> {
    /// An already resolved container.
    Context(&'a RootContext),
    /// Container node name.
    Name(&'a str),
    /// Use the first segment of the looked up input.
    Infer,
}

pub struct SegmentPathResolver<'a> {
    codec: &'a dyn TreeCodec,
}

impl<'a> SegmentPathResolver<'a> {
    pub fn new(codec: &'a dyn TreeCodec) -> Self {
        Self { codec }
    }

    /// Resolve the root container named `root_name`. Anything but exactly
    /// one match is an error.
    pub fn resolve_root_context(&self, root_name: &str) -> Result<RootContext> {
        let mut matches = self.codec.root_containers(root_name);
        if matches.len() != 1 {
            return Err(Error::AmbiguousOrMissingRoot {
                name: root_name.to_string(),
                matches: matches.len(),
            });
        }
        Ok(matches.remove(0))
    }

    fn context(&self, root: RootSelector<'_>, input: &str) -> Result<RootContext> {
        match root {
            RootSelector::Context(ctx) => Ok(ctx.clone()),
            RootSelector::Name(name) => self.resolve_root_context(name),
            RootSelector::Infer => {
                let segments = normalize(input)?;
                self.resolve_root_context(&segments[0])
            }
        }
    }

    /// Look `input` up as an identifier first, then as a path. Absence is
    /// not an error.
    pub fn resolve_node(&self, root: RootSelector<'_>, input: &str) -> Result<Option<NodeInfo>> {
        let ctx = self.context(root, input)?;
        Ok(self.resolve_in(&ctx, input))
    }

    fn resolve_in(&self, ctx: &RootContext, input: &str) -> Option<NodeInfo> {
        if let Some(node) = self.codec.lookup_by_identifier(ctx, input) {
            debug!(identifier = input, path = %node.path, "Resolved node by identifier");
            return Some(node);
        }
        let address = Address::parse(input).ok()?;
        let node = self.codec.lookup_by_path(ctx, &address.full_path());
        debug!(path = %address.full_path(), found = node.is_some(), "Resolved node by path");
        node
    }

    /// Resolve `input` to its canonical address.
    pub fn to_address(&self, root: RootSelector<'_>, input: &str) -> Result<Option<Address>> {
        match self.resolve_node(root, input)? {
            Some(node) => Ok(Some(Address::parse(&self.codec.current_address(&node))?)),
            None => Ok(None),
        }
    }

    /// Every node from the root container down to the resolved target, in
    /// root-to-leaf order. Empty when the target does not resolve.
    pub fn all_nodes_on_path(&self, root: RootSelector<'_>, input: &str) -> Result<Vec<NodeInfo>> {
        let ctx = self.context(root, input)?;
        let Some(target) = self.resolve_in(&ctx, input) else {
            return Ok(Vec::new());
        };
        let address = Address::parse(&self.codec.current_address(&target))?;
        Ok(address
            .ancestry()
            .iter()
            .filter_map(|a| self.codec.lookup_by_path(&ctx, &a.full_path()))
            .collect())
    }
}
