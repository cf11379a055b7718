use shared::{Colour, Player};

/// One leaderboard row, borrowed from the roster it was ranked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing<'a> {
    /// 1-based position on the board
    pub position: usize,
    pub id: &'a str,
    pub name: &'a str,
    pub colour: Colour,
    pub score: u64,
}

/// Ranks players by score, highest first. Equal scores keep roster order.
pub fn rank(players: &[Player]) -> Vec<Standing<'_>> {
    let mut ordered: Vec<&Player> = players.iter().collect();
    // `sort_by` is stable, which the tie rule relies on
    ordered.sort_by(|a, b| b.score.cmp(&a.score));

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, player)| Standing {
            position: i + 1,
            id: &player.id,
            name: &player.name,
            colour: player.colour(),
            score: player.score,
        })
        .collect()
}
