//! Legal-move index: origin square to reachable destinations for one position.

use std::collections::{BTreeMap, HashMap};

use shakmaty::Square;

use crate::domain::chess::CanonicalMove;
use crate::domain::oracle::PositionOracle;

/// Per-position cache of legal moves grouped by origin.
///
/// Destinations keep the oracle's generation order; a promotion square
/// appears once even though four moves reach it.
#[derive(Clone, Debug, Default)]
pub struct LegalMoveIndex {
    by_origin: HashMap<Square, Vec<Square>>,
    moves: Vec<CanonicalMove>,
    /// Ply of the position this index was built for
    ply: usize,
}

impl LegalMoveIndex {
    pub fn build<O: PositionOracle + ?Sized>(oracle: &O) -> Self {
        let moves = oracle.legal_moves();
        let mut by_origin: HashMap<Square, Vec<Square>> = HashMap::new();
        for m in &moves {
            let destinations = by_origin.entry(m.from).or_default();
            if !destinations.contains(&m.to) {
                destinations.push(m.to);
            }
        }
        Self {
            by_origin,
            moves,
            ply: oracle.ply(),
        }
    }

    /// Destinations reachable from `from`. Empty for empty squares, enemy
    /// pieces and immobile pieces alike.
    pub fn destinations(&self, from: Square) -> &[Square] {
        self.by_origin
            .get(&from)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_destination(&self, from: Square, to: Square) -> bool {
        self.destinations(from).contains(&to)
    }

    /// Whether the exact move, promotion piece included, is legal
    pub fn contains(&self, m: &CanonicalMove) -> bool {
        self.has_destination(m.from, m.to) && self.moves.contains(m)
    }

    /// Squares holding a piece that can move
    pub fn origins(&self) -> impl Iterator<Item = Square> + '_ {
        self.by_origin.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn ply(&self) -> usize {
        self.ply
    }

    /// Square names for the highlight layer, origins sorted for stable output
    pub fn to_highlight_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut origins: Vec<Square> = self.origins().collect();
        origins.sort();
        origins
            .into_iter()
            .map(|from| {
                let destinations = self
                    .destinations(from)
                    .iter()
                    .map(|to| to.to_string())
                    .collect();
                (from.to_string(), destinations)
            })
            .collect()
    }
}
