//! Decoding of the flat `interleaved_route` arrays produced by the scheduling
//! service: `[n0, l0, n1, l1, ..., nk]`, node ids at even positions and link ids
//! at odd positions.

use serde::{Deserialize, Serialize};

use crate::models::{LinkId, NodeId, ParsedRoute, RouteSegment};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteParseError {
    /// Even-length input: the last token is a link with no closing node.
    #[error("interleaved route of length {len} ends on link {link} without a closing node")]
    DanglingLink { link: LinkId, len: usize },
    #[error("token {index} (`{token}`) is not a numeric id")]
    InvalidToken { index: usize, token: String },
}

/// A single route token as it appears on the wire. The scheduling service has
/// sent both JSON numbers and numeric strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteToken {
    Id(u64),
    Text(String),
}

impl From<u64> for RouteToken {
    fn from(id: u64) -> Self {
        RouteToken::Id(id)
    }
}

impl RouteToken {
    fn resolve(&self, index: usize) -> Result<u64, RouteParseError> {
        match self {
            RouteToken::Id(id) => Ok(*id),
            RouteToken::Text(text) => {
                text.trim()
                    .parse()
                    .map_err(|_| RouteParseError::InvalidToken {
                        index,
                        token: text.clone(),
                    })
            }
        }
    }
}

/// Decode wire tokens, then split them into segments.
pub fn parse_route_tokens(tokens: &[RouteToken]) -> Result<ParsedRoute, RouteParseError> {
    let ids = tokens
        .iter()
        .enumerate()
        .map(|(index, token)| token.resolve(index))
        .collect::<Result<Vec<_>, _>>()?;
    parse_interleaved_route(&ids)
}

/// Split an interleaved node/link sequence into one segment per consecutive
/// node pair.
///
/// Inputs shorter than three tokens carry no segment and yield an empty route.
/// An even-length input (a trailing link with no closing node) is rejected with
/// [`RouteParseError::DanglingLink`] instead of dropping the link.
pub fn parse_interleaved_route(tokens: &[u64]) -> Result<ParsedRoute, RouteParseError> {
    if tokens.len() < 3 {
        return Ok(ParsedRoute::default());
    }
    if tokens.len() % 2 == 0 {
        let link = tokens[tokens.len() - 1];
        tracing::warn!(
            len = tokens.len(),
            link,
            "interleaved route ends on a link token"
        );
        return Err(RouteParseError::DanglingLink {
            link,
            len: tokens.len(),
        });
    }

    let node_ids: Vec<NodeId> = tokens.iter().step_by(2).copied().collect();
    let link_ids: Vec<LinkId> = tokens.iter().skip(1).step_by(2).copied().collect();

    let segments = tokens
        .windows(3)
        .step_by(2)
        .map(|w| RouteSegment {
            from: w[0],
            to: w[2],
            links: vec![w[1]],
        })
        .collect();

    Ok(ParsedRoute {
        segments,
        node_ids,
        link_ids,
    })
}
