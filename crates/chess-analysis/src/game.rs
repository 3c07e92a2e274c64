//! Game state: the ordered, append-only move list and the positions it
//! passes through.
//!
//! Move legality and board bookkeeping are delegated to the `chess` crate;
//! this module only records what the analysis pipeline needs to know about
//! every ply.

use std::str::FromStr;

use chess::{Board, ChessMove, Color, File, Piece, Rank, Square};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or extending a game.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),
    #[error("Malformed move '{text}' at index {index}")]
    MalformedMove { index: usize, text: String },
    #[error("Illegal move '{text}' at index {index}")]
    IllegalMove { index: usize, text: String },
}

/// The two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn to_color(self) -> Color {
        match self {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

/// One ply of the game. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRecord {
    /// 0-based position in the game.
    pub index: usize,
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
    /// Side that played the move.
    pub side: Side,
    /// Piece type that moved.
    pub piece: Piece,
    /// Piece taken by the move, if any (a pawn for en passant).
    pub captured: Option<Piece>,
    /// Move in UCI notation, e.g. `e7e8q`.
    pub uci: String,
    pub is_castle: bool,
    pub is_en_passant: bool,
}

impl MoveRecord {
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }
}

/// The authoritative move list plus every position it passes through.
///
/// `positions[i]` is the board immediately before move `i`;
/// `positions[len]` is the current board.
#[derive(Debug, Clone)]
pub struct GameState {
    moves: Vec<MoveRecord>,
    positions: Vec<Board>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Empty game from the standard starting position.
    pub fn new() -> Self {
        Self::from_board(Board::default())
    }

    pub fn from_board(start: Board) -> Self {
        Self {
            moves: Vec::new(),
            positions: vec![start],
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let board = Board::from_str(fen).map_err(|_| GameError::InvalidFen(fen.to_string()))?;
        Ok(Self::from_board(board))
    }

    /// Loads a whole game given in UCI notation, optionally from a custom
    /// start position.
    pub fn from_uci_moves<S: AsRef<str>>(
        start_fen: Option<&str>,
        moves: &[S],
    ) -> Result<Self, GameError> {
        let mut game = match start_fen {
            Some(fen) => Self::from_fen(fen)?,
            None => Self::new(),
        };
        for mv in moves {
            game.push_uci(mv.as_ref())?;
        }
        Ok(game)
    }

    /// Appends one move. The move must be legal in the current position.
    pub fn push_uci(&mut self, text: &str) -> Result<&MoveRecord, GameError> {
        let index = self.moves.len();
        let board = *self.current();

        let mv = parse_uci_move(text).ok_or_else(|| GameError::MalformedMove {
            index,
            text: text.to_string(),
        })?;
        if !board.legal(mv) {
            return Err(GameError::IllegalMove {
                index,
                text: text.to_string(),
            });
        }

        let from = mv.get_source();
        let to = mv.get_dest();
        // legal() guarantees a piece of the side to move on the source square
        let piece = board.piece_on(from).unwrap_or(Piece::Pawn);
        let file_change = from.get_file().to_index() != to.get_file().to_index();
        let is_en_passant = piece == Piece::Pawn && file_change && board.piece_on(to).is_none();
        let captured = if is_en_passant {
            Some(Piece::Pawn)
        } else {
            board.piece_on(to)
        };
        let file_distance =
            (from.get_file().to_index() as i32 - to.get_file().to_index() as i32).abs();
        let is_castle = piece == Piece::King && file_distance == 2;

        self.moves.push(MoveRecord {
            index,
            from,
            to,
            promotion: mv.get_promotion(),
            side: board.side_to_move().into(),
            piece,
            captured,
            uci: mv.to_string(),
            is_castle,
            is_en_passant,
        });
        self.positions.push(board.make_move_new(mv));

        Ok(&self.moves[index])
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn get(&self, index: usize) -> Option<&MoveRecord> {
        self.moves.get(index)
    }

    /// Board immediately before move `index`.
    pub fn position_before(&self, index: usize) -> Option<&Board> {
        if index < self.moves.len() {
            self.positions.get(index)
        } else {
            None
        }
    }

    /// Board immediately after move `index`.
    pub fn position_after(&self, index: usize) -> Option<&Board> {
        if index < self.moves.len() {
            self.positions.get(index + 1)
        } else {
            None
        }
    }

    pub fn current(&self) -> &Board {
        // never empty: constructed with the start position
        &self.positions[self.positions.len() - 1]
    }
}

/// Parses `e2e4` / `e7e8q` into a move without checking legality.
pub fn parse_uci_move(text: &str) -> Option<ChessMove> {
    let bytes = text.as_bytes();
    if bytes.len() != 4 && bytes.len() != 5 {
        return None;
    }

    let square = |file: u8, rank: u8| -> Option<Square> {
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return None;
        }
        Some(Square::make_square(
            Rank::from_index((rank - b'1') as usize),
            File::from_index((file - b'a') as usize),
        ))
    };

    let from = square(bytes[0], bytes[1])?;
    let to = square(bytes[2], bytes[3])?;
    let promotion = match bytes.get(4) {
        None => None,
        Some(b'q') | Some(b'Q') => Some(Piece::Queen),
        Some(b'r') | Some(b'R') => Some(Piece::Rook),
        Some(b'b') | Some(b'B') => Some(Piece::Bishop),
        Some(b'n') | Some(b'N') => Some(Piece::Knight),
        Some(_) => return None,
    };

    Some(ChessMove::new(from, to, promotion))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_positions_in_order() {
        let game = GameState::from_uci_moves(None, &["e2e4", "e7e5", "g1f3"]).unwrap();
        assert_eq!(game.len(), 3);
        assert_eq!(
            game.position_before(0).unwrap().to_string(),
            Board::default().to_string()
        );
        assert_eq!(
            game.position_after(0).unwrap().to_string(),
            game.position_before(1).unwrap().to_string()
        );
        assert_eq!(game.get(1).unwrap().side, Side::Black);
        assert!(game.position_before(3).is_none());
    }

    #[test]
    fn records_captures_and_flags() {
        // 1. e4 d5 2. exd5
        let game = GameState::from_uci_moves(None, &["e2e4", "d7d5", "e4d5"]).unwrap();
        let capture = game.get(2).unwrap();
        assert_eq!(capture.captured, Some(Piece::Pawn));
        assert_eq!(capture.piece, Piece::Pawn);
        assert!(!capture.is_en_passant);
        assert!(game.get(0).unwrap().captured.is_none());
    }

    #[test]
    fn detects_en_passant() {
        let game =
            GameState::from_uci_moves(None, &["e2e4", "a7a6", "e4e5", "d7d5", "e5d6"]).unwrap();
        let ep = game.get(4).unwrap();
        assert!(ep.is_en_passant);
        assert_eq!(ep.captured, Some(Piece::Pawn));
    }

    #[test]
    fn detects_castling() {
        let game = GameState::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mut game = game;
        let castle = game.push_uci("e1g1").unwrap();
        assert!(castle.is_castle);
        assert_eq!(castle.piece, Piece::King);
    }

    #[test]
    fn promotion_keeps_piece() {
        let mut game = GameState::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let promo = game.push_uci("a7a8q").unwrap();
        assert_eq!(promo.promotion, Some(Piece::Queen));
        assert_eq!(promo.uci, "a7a8q");
    }

    #[test]
    fn rejects_illegal_and_malformed_moves() {
        let mut game = GameState::new();
        assert_eq!(
            game.push_uci("e2e5").unwrap_err(),
            GameError::IllegalMove {
                index: 0,
                text: "e2e5".to_string()
            }
        );
        assert!(matches!(
            game.push_uci("z9e4"),
            Err(GameError::MalformedMove { .. })
        ));
        assert!(game.is_empty());
    }

    #[test]
    fn rejects_invalid_fen() {
        assert!(matches!(
            GameState::from_fen("not a fen"),
            Err(GameError::InvalidFen(_))
        ));
    }

    #[test]
    fn parse_uci_move_handles_promotion_suffix() {
        let mv = parse_uci_move("b7b8n").unwrap();
        assert_eq!(mv.get_promotion(), Some(Piece::Knight));
        assert!(parse_uci_move("b7b8x").is_none());
        assert!(parse_uci_move("e2").is_none());
    }
}
