//! Material accounting and post-move position descriptors.

use chess::{Board, Color, Piece, Square, ALL_PIECES};
use serde::{Deserialize, Serialize};

use crate::config::PositionConfig;
use crate::game::{MoveRecord, Side};

/// Base value of a piece in centipawns. The king is priceless and counts 0.
pub fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 100,
        Piece::Knight => 320,
        Piece::Bishop => 330,
        Piece::Rook => 500,
        Piece::Queen => 900,
        Piece::King => 0,
    }
}

/// Coarse game phase used to pick a threshold set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Opening,
    Middlegame,
    Endgame,
}

/// Tactical features of the move itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TacticalPatterns {
    pub check: bool,
    pub capture: bool,
    pub promotion: bool,
    pub castling: bool,
}

impl TacticalPatterns {
    pub fn of(record: &MoveRecord, after: &Board) -> Self {
        Self {
            check: after.checkers().popcnt() > 0,
            capture: record.is_capture(),
            promotion: record.promotion.is_some(),
            castling: record.is_castle,
        }
    }

    pub fn any(&self) -> bool {
        self.check || self.capture || self.promotion || self.castling
    }
}

/// Piece counts, balance, phase and tactical flag of the board after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDescriptor {
    pub white_pieces: u32,
    pub black_pieces: u32,
    /// White material minus Black material, in centipawns.
    pub material_balance: i32,
    pub phase: GamePhase,
    pub tactical: bool,
}

impl BoardDescriptor {
    /// Describes `after`, the board reached by move `index`.
    pub fn describe(after: &Board, index: usize, config: &PositionConfig) -> Self {
        let white_pieces = after.color_combined(Color::White).popcnt();
        let black_pieces = after.color_combined(Color::Black).popcnt();
        let total = white_pieces + black_pieces;
        let material_balance = material(after, Color::White) - material(after, Color::Black);

        let phase = if index < config.opening_ply_limit {
            GamePhase::Opening
        } else if total <= config.endgame_piece_limit {
            GamePhase::Endgame
        } else {
            GamePhase::Middlegame
        };

        let tactical = after.checkers().popcnt() > 0
            || total < config.tactical_piece_limit
            || material_balance.abs() >= config.tactical_imbalance;

        Self {
            white_pieces,
            black_pieces,
            material_balance,
            phase,
            tactical,
        }
    }

    pub fn total_pieces(&self) -> u32 {
        self.white_pieces + self.black_pieces
    }
}

/// Total material of one side.
pub fn material(board: &Board, color: Color) -> i32 {
    let own = *board.color_combined(color);
    ALL_PIECES
        .iter()
        .map(|piece| (*board.pieces(*piece) & own).popcnt() as i32 * piece_value(*piece))
        .sum()
}

/// Value at stake in a capture: base value plus positional bonuses. Zero
/// when the move captures nothing.
///
/// `before` is the board the move was played on; it locates the enemy king.
pub fn material_loss(record: &MoveRecord, before: &Board, config: &PositionConfig) -> i32 {
    let Some(captured) = record.captured else {
        return 0;
    };

    let mut value = piece_value(captured);

    if is_center(record.to) {
        value += config.center_capture_bonus;
    }

    if captured != Piece::Pawn && is_deep(record.to, record.side) {
        value += config.deep_capture_bonus;
    }

    let enemy_king = before.king_square(record.side.opposite().to_color());
    if chebyshev(record.to, enemy_king) <= config.king_zone_radius as usize {
        value += config.king_zone_capture_bonus;
    }

    value
}

fn is_center(sq: Square) -> bool {
    let file = sq.get_file().to_index();
    let rank = sq.get_rank().to_index();
    (3..=4).contains(&file) && (3..=4).contains(&rank)
}

/// Sixth rank or beyond from the mover's side.
fn is_deep(sq: Square, side: Side) -> bool {
    let rank = sq.get_rank().to_index();
    match side {
        Side::White => rank >= 5,
        Side::Black => rank <= 2,
    }
}

fn chebyshev(a: Square, b: Square) -> usize {
    let df = a.get_file().to_index().abs_diff(b.get_file().to_index());
    let dr = a.get_rank().to_index().abs_diff(b.get_rank().to_index());
    df.max(dr)
}
