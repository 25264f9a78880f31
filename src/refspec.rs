//! Refspec parsing, matching, and name transformation.
//!
//! A refspec is the `[+]src:dst` rule that maps ref names across the
//! local/remote boundary. Matching and transformation are pure string
//! functions; a parsed [`Refspec`] is immutable and freely shareable.

use std::fmt;

use thiserror::Error;

/// Which operation a refspec applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Fetch,
    Push,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Fetch => "fetch",
            Direction::Push => "push",
        }
    }
}

/// Errors from refspec parsing and transformation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RefspecError {
    #[error("malformed refspec {spec:?}: {reason}")]
    Malformed { spec: String, reason: String },

    #[error("name {name:?} does not match the refspec pattern")]
    NoMatch { name: String },
}

/// A parsed `[+]src:dst` mapping rule.
///
/// Each side carries at most one `*` wildcard; a wildcard on one side
/// requires a wildcard on the other. Construction validates, so every
/// live `Refspec` holds a well-formed pair of patterns.
#[derive(Clone, PartialEq, Eq)]
pub struct Refspec {
    src: String,
    dst: String,
    direction: Direction,
    force: bool,
}

impl Refspec {
    /// Parse a refspec string.
    ///
    /// A leading `+` sets the force flag (allow non-fast-forward updates).
    /// Fails if the `:` separator is missing, either side is empty, either
    /// side has more than one `*`, or only one side has a `*`.
    pub fn parse(spec: &str, direction: Direction) -> Result<Self, RefspecError> {
        let malformed = |reason: &str| RefspecError::Malformed {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (force, rest) = match spec.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        let (src, dst) = rest
            .split_once(':')
            .ok_or_else(|| malformed("missing ':' separator"))?;
        if src.is_empty() {
            return Err(malformed("empty source pattern"));
        }
        if dst.is_empty() {
            return Err(malformed("empty destination pattern"));
        }

        let src_stars = src.matches('*').count();
        let dst_stars = dst.matches('*').count();
        if src_stars > 1 || dst_stars > 1 {
            return Err(malformed("more than one '*' in a pattern"));
        }
        if src_stars != dst_stars {
            return Err(malformed("'*' must appear on both sides or neither"));
        }

        Ok(Self {
            src: src.to_string(),
            dst: dst.to_string(),
            direction,
            force,
        })
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether this refspec allows non-fast-forward updates.
    pub fn force(&self) -> bool {
        self.force
    }

    /// Whether `name` matches the source pattern.
    pub fn matches_source(&self, name: &str) -> bool {
        pattern_matches(&self.src, name)
    }

    /// Whether `name` matches the destination pattern.
    pub fn matches_destination(&self, name: &str) -> bool {
        pattern_matches(&self.dst, name)
    }

    /// Map a name matching the source pattern onto the destination pattern.
    pub fn transform(&self, name: &str) -> Result<String, RefspecError> {
        rewrite(&self.src, &self.dst, name)
    }

    /// Map a name matching the destination pattern back onto the source.
    pub fn reverse_transform(&self, name: &str) -> Result<String, RefspecError> {
        rewrite(&self.dst, &self.src, name)
    }
}

impl fmt::Display for Refspec {
    /// Canonical `[+]src:dst` form; round-trips through [`Refspec::parse`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.force {
            write!(f, "+")?;
        }
        write!(f, "{}:{}", self.src, self.dst)
    }
}

impl fmt::Debug for Refspec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Refspec({:?}, {self})", self.direction)
    }
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
    }
}

/// Substitute the wildcard capture of `name` under `from` into `to`.
///
/// The output is allocated once with an exact upper bound
/// (`name.len() + to.len()`); no grow-and-retry.
fn rewrite(from: &str, to: &str, name: &str) -> Result<String, RefspecError> {
    if !pattern_matches(from, name) {
        return Err(RefspecError::NoMatch {
            name: name.to_string(),
        });
    }

    match (from.split_once('*'), to.split_once('*')) {
        (None, _) => Ok(to.to_string()),
        (Some((prefix, suffix)), Some((to_prefix, to_suffix))) => {
            let captured = &name[prefix.len()..name.len() - suffix.len()];
            let mut out = String::with_capacity(name.len() + to.len());
            out.push_str(to_prefix);
            out.push_str(captured);
            out.push_str(to_suffix);
            Ok(out)
        }
        // Parse guarantees wildcard parity between the two sides.
        (Some(_), None) => unreachable!("wildcard on one side only"),
    }
}
