//! Random winner selection and red/blue team partitioning.
//!
//! Nothing in here talks to Discord. Callers hand in the members of a voice
//! channel and a random number generator, so the same seed always produces
//! the same result.

use std::collections::BTreeMap;
use std::fmt;

use poise::serenity_prelude as serenity;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{CaptainProblem, TeamError};

/// A voice channel occupant as reported by the gateway.
#[derive(Debug, Clone)]
pub struct MemberRef {
    pub id: serenity::UserId,
    pub name: String,
    pub bot: bool,
}

impl MemberRef {
    pub fn new(id: impl Into<serenity::UserId>, name: impl Into<String>, bot: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bot,
        }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

impl From<&serenity::Member> for MemberRef {
    fn from(member: &serenity::Member) -> Self {
        Self {
            id: member.user.id,
            name: member.display_name().to_string(),
            bot: member.user.bot,
        }
    }
}

// Members are identified by their user id alone; display names change.
impl PartialEq for MemberRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MemberRef {}

impl std::hash::Hash for MemberRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Red,
    Blue,
}

impl Side {
    pub fn title(self) -> &'static str {
        match self {
            Side::Red => "Red",
            Side::Blue => "Blue",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Red => f.write_str("red"),
            Side::Blue => f.write_str("blue"),
        }
    }
}

/// Two disjoint teams drawn from one voice channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teams {
    pub red: Vec<MemberRef>,
    pub blue: Vec<MemberRef>,
    pub red_captain: Option<serenity::UserId>,
    pub blue_captain: Option<serenity::UserId>,
}

impl Teams {
    pub fn side(&self, side: Side) -> &[MemberRef] {
        match side {
            Side::Red => &self.red,
            Side::Blue => &self.blue,
        }
    }

    pub fn captain(&self, side: Side) -> Option<serenity::UserId> {
        match side {
            Side::Red => self.red_captain,
            Side::Blue => self.blue_captain,
        }
    }

    /// The side that ended up with one more member, if the pool was odd.
    pub fn extra_side(&self) -> Option<Side> {
        match self.red.len().cmp(&self.blue.len()) {
            std::cmp::Ordering::Greater => Some(Side::Red),
            std::cmp::Ordering::Less => Some(Side::Blue),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn side_of(&self, member: serenity::UserId) -> Option<Side> {
        if self.red.iter().any(|m| m.id == member) {
            Some(Side::Red)
        } else if self.blue.iter().any(|m| m.id == member) {
            Some(Side::Blue)
        } else {
            None
        }
    }

    pub fn contains(&self, member: serenity::UserId) -> bool {
        self.side_of(member).is_some()
    }

    pub fn len(&self) -> usize {
        self.red.len() + self.blue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps one entry per user id, ordered by id.
///
/// The gateway hands members over in whatever order its maps iterate in;
/// ordering them here means only the rng decides the outcome.
fn dedup_sorted(members: &[MemberRef]) -> Vec<MemberRef> {
    members
        .iter()
        .map(|m| (m.id, m.clone()))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect()
}

/// Picks one member uniformly at random.
///
/// Bots are dropped from the pool unless `include_bots` is set.
pub fn pick_winner<R: Rng + ?Sized>(
    members: &[MemberRef],
    include_bots: bool,
    rng: &mut R,
) -> Result<MemberRef, TeamError> {
    let pool: Vec<MemberRef> = dedup_sorted(members)
        .into_iter()
        .filter(|m| include_bots || !m.bot)
        .collect();

    pool.choose(rng).cloned().ok_or(TeamError::EmptyPool)
}

fn check_captain(
    captain: &MemberRef,
    side: Side,
    members: &[MemberRef],
) -> Result<(), TeamError> {
    if !members.iter().any(|m| m.id == captain.id) {
        return Err(TeamError::captain(CaptainProblem::NotInChannel(side)));
    }
    if captain.bot {
        return Err(TeamError::captain(CaptainProblem::Bot));
    }
    Ok(())
}

/// Splits the human members into red and blue teams.
///
/// Captains are seated first. The rest are shuffled and each one joins the
/// smaller team; on a tie the first side gets them, which is red unless only
/// blue has a captain. Team sizes therefore never differ by more than one and
/// the odd member, if any, lands on the first side.
pub fn make_teams<R: Rng + ?Sized>(
    members: &[MemberRef],
    red_captain: Option<&MemberRef>,
    blue_captain: Option<&MemberRef>,
    rng: &mut R,
) -> Result<Teams, TeamError> {
    if let (Some(red), Some(blue)) = (red_captain, blue_captain) {
        if red.id == blue.id {
            return Err(TeamError::captain(CaptainProblem::SameMember));
        }
    }
    if let Some(captain) = red_captain {
        check_captain(captain, Side::Red, members)?;
    }
    if let Some(captain) = blue_captain {
        check_captain(captain, Side::Blue, members)?;
    }

    let pool: Vec<MemberRef> = dedup_sorted(members)
        .into_iter()
        .filter(|m| !m.bot)
        .collect();
    if pool.len() < 2 {
        return Err(TeamError::TooFewMembers);
    }

    let is_captain = |m: &MemberRef| {
        red_captain.is_some_and(|c| c.id == m.id) || blue_captain.is_some_and(|c| c.id == m.id)
    };

    let mut red = Vec::with_capacity(pool.len() / 2 + 1);
    let mut blue = Vec::with_capacity(pool.len() / 2 + 1);
    // Seat captains using the pool's copy so names match the channel listing.
    for member in &pool {
        if red_captain.is_some_and(|c| c.id == member.id) {
            red.push(member.clone());
        } else if blue_captain.is_some_and(|c| c.id == member.id) {
            blue.push(member.clone());
        }
    }

    let mut remainder: Vec<MemberRef> = pool.iter().filter(|m| !is_captain(*m)).cloned().collect();
    remainder.shuffle(rng);

    let first = if red_captain.is_none() && blue_captain.is_some() {
        Side::Blue
    } else {
        Side::Red
    };

    for member in remainder {
        let side = match red.len().cmp(&blue.len()) {
            std::cmp::Ordering::Less => Side::Red,
            std::cmp::Ordering::Greater => Side::Blue,
            std::cmp::Ordering::Equal => first,
        };
        match side {
            Side::Red => red.push(member),
            Side::Blue => blue.push(member),
        }
    }

    Ok(Teams {
        red,
        blue,
        red_captain: red_captain.map(|c| c.id),
        blue_captain: blue_captain.map(|c| c.id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn member(id: u64, name: &str) -> MemberRef {
        MemberRef::new(id, name, false)
    }

    fn bot(id: u64, name: &str) -> MemberRef {
        MemberRef::new(id, name, true)
    }

    fn pool(n: u64) -> Vec<MemberRef> {
        (1..=n).map(|i| member(i, &format!("member{i}"))).collect()
    }

    fn ids(members: &[MemberRef]) -> HashSet<u64> {
        members.iter().map(|m| m.id.get()).collect()
    }

    #[test]
    fn test_pick_winner_returns_pool_member() {
        let members = pool(6);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let winner = pick_winner(&members, false, &mut rng).unwrap();
            assert!(members.contains(&winner));
        }
    }

    #[test]
    fn test_pick_winner_skips_bots_unless_included() {
        let members = vec![bot(1, "music"), member(2, "alice")];
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            assert_eq!(pick_winner(&members, false, &mut rng).unwrap().id.get(), 2);
        }

        let only_bots = vec![bot(1, "music"), bot(3, "logger")];
        assert!(matches!(
            pick_winner(&only_bots, false, &mut rng),
            Err(TeamError::EmptyPool)
        ));
        assert!(pick_winner(&only_bots, true, &mut rng).unwrap().bot);
    }

    #[test]
    fn test_pick_winner_empty_pool() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            pick_winner(&[], true, &mut rng),
            Err(TeamError::EmptyPool)
        ));
    }

    #[test]
    fn test_pick_winner_is_uniform() {
        // Chi-square goodness of fit with 4 degrees of freedom; the critical
        // value at p = 0.001 is 18.47.
        let members = pool(5);
        let trials = 20_000;
        let mut counts = [0usize; 5];
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..trials {
            let winner = pick_winner(&members, false, &mut rng).unwrap();
            counts[(winner.id.get() - 1) as usize] += 1;
        }

        let expected = trials as f64 / 5.0;
        let chi_square: f64 = counts
            .iter()
            .map(|&c| {
                let diff = c as f64 - expected;
                diff * diff / expected
            })
            .sum();
        assert!(chi_square < 18.47, "chi-square {chi_square} for {counts:?}");
    }

    #[test]
    fn test_make_teams_partitions_pool() {
        let mut rng = StdRng::seed_from_u64(42);
        for size in 2..=12 {
            let members = pool(size);
            let teams = make_teams(&members, None, None, &mut rng).unwrap();

            let red = ids(&teams.red);
            let blue = ids(&teams.blue);
            assert!(red.is_disjoint(&blue));
            assert_eq!(red.union(&blue).count(), size as usize);
            assert!(teams.red.len().abs_diff(teams.blue.len()) <= 1);
        }
    }

    #[test]
    fn test_make_teams_odd_member_goes_to_red_without_captains() {
        let mut rng = StdRng::seed_from_u64(3);
        let teams = make_teams(&pool(7), None, None, &mut rng).unwrap();
        assert_eq!(teams.red.len(), 4);
        assert_eq!(teams.blue.len(), 3);
        assert_eq!(teams.extra_side(), Some(Side::Red));
    }

    #[test]
    fn test_make_teams_lone_blue_captain_gets_odd_member() {
        let members = pool(5);
        let mut rng = StdRng::seed_from_u64(3);
        let teams = make_teams(&members, None, Some(&members[4]), &mut rng).unwrap();
        assert_eq!(teams.blue.len(), 3);
        assert_eq!(teams.red.len(), 2);
        assert!(teams.blue.contains(&members[4]));
    }

    #[test]
    fn test_make_teams_lone_red_captain_gets_odd_member() {
        let members = pool(5);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let teams = make_teams(&members, Some(&members[2]), None, &mut rng).unwrap();
            assert_eq!(teams.red.len(), 3);
            assert_eq!(teams.blue.len(), 2);
            assert!(teams.red.contains(&members[2]));
            assert_eq!(teams.red_captain, Some(members[2].id));
            assert_eq!(teams.blue_captain, None);
        }
    }

    #[test]
    fn test_make_teams_with_both_captains() {
        let members = pool(5);
        let (a, b) = (&members[0], &members[1]);
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let teams = make_teams(&members, Some(a), Some(b), &mut rng).unwrap();

            assert!(teams.red.contains(a));
            assert!(teams.blue.contains(b));
            assert!(matches!(
                (teams.red.len(), teams.blue.len()),
                (3, 2) | (2, 3)
            ));
            let all = ids(&teams.red).union(&ids(&teams.blue)).count();
            assert_eq!(all, 5);
            assert_eq!(teams.red_captain, Some(a.id));
            assert_eq!(teams.blue_captain, Some(b.id));
        }
    }

    #[test]
    fn test_make_teams_rejects_same_captain() {
        let members = pool(4);
        let mut rng = StdRng::seed_from_u64(0);
        let err = make_teams(&members, Some(&members[0]), Some(&members[0]), &mut rng).unwrap_err();
        assert!(matches!(
            err,
            TeamError::InvalidCaptain(CaptainProblem::SameMember)
        ));
    }

    #[test]
    fn test_make_teams_rejects_foreign_or_bot_captain() {
        let mut members = pool(4);
        members.push(bot(99, "music"));
        let mut rng = StdRng::seed_from_u64(0);

        let stranger = member(1234, "stranger");
        assert!(matches!(
            make_teams(&members, None, Some(&stranger), &mut rng),
            Err(TeamError::InvalidCaptain(CaptainProblem::NotInChannel(Side::Blue)))
        ));

        let music = bot(99, "music");
        assert!(matches!(
            make_teams(&members, Some(&music), None, &mut rng),
            Err(TeamError::InvalidCaptain(CaptainProblem::Bot))
        ));
    }

    #[test]
    fn test_make_teams_needs_two_humans() {
        let members = vec![member(1, "alice"), bot(2, "music")];
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            make_teams(&members, None, None, &mut rng),
            Err(TeamError::TooFewMembers)
        ));
    }

    #[test]
    fn test_make_teams_never_includes_bots() {
        let mut members = pool(4);
        members.push(bot(50, "music"));
        let mut rng = StdRng::seed_from_u64(11);
        let teams = make_teams(&members, None, None, &mut rng).unwrap();
        assert_eq!(teams.len(), 4);
        assert!(!teams.contains(serenity::UserId::new(50)));
    }

    #[test]
    fn test_make_teams_ignores_input_order() {
        let members = pool(8);
        let mut reversed = members.clone();
        reversed.reverse();

        let first = make_teams(&members, None, None, &mut StdRng::seed_from_u64(77)).unwrap();
        let second = make_teams(&reversed, None, None, &mut StdRng::seed_from_u64(77)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_make_teams_collapses_duplicates() {
        let mut members = pool(3);
        members.push(member(2, "member2 again"));
        let mut rng = StdRng::seed_from_u64(5);
        let teams = make_teams(&members, None, None, &mut rng).unwrap();
        assert_eq!(teams.len(), 3);
    }
}
