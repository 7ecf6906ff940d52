use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, CreateEmbedFooter};

use super::actions::{MoveReport, ReconveneReport, Skipped};
use crate::teams::{MemberRef, Side, Teams};

fn channel_mention(channel: serenity::ChannelId) -> String {
    format!("<#{}>", channel)
}

fn format_member(member: &MemberRef, captain: Option<serenity::UserId>) -> String {
    if captain == Some(member.id) {
        format!("⭐ {} (Captain)", member.mention())
    } else {
        member.mention()
    }
}

/// Field body listing one team, captain first.
pub fn team_field(teams: &Teams, side: Side) -> String {
    let captain = teams.captain(side);
    let members = teams.side(side);
    if members.is_empty() {
        return "(none)".to_string();
    }

    let mut ordered: Vec<&MemberRef> = members.iter().collect();
    ordered.sort_by_key(|m| Some(m.id) != captain);
    ordered
        .into_iter()
        .map(|m| format_member(m, captain))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn team_field_name(teams: &Teams, side: Side) -> String {
    let icon = match side {
        Side::Red => "🟥",
        Side::Blue => "🟦",
    };
    format!("{} {} Team ({})", icon, side.title(), teams.side(side).len())
}

pub fn teams_embed(channel_name: &str, teams: &Teams, colour: u32) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("Random Teams for {}", channel_name))
        .colour(colour)
        .field(team_field_name(teams, Side::Red), team_field(teams, Side::Red), true)
        .field(team_field_name(teams, Side::Blue), team_field(teams, Side::Blue), true)
        .timestamp(serenity::Timestamp::now());

    if let Some(side) = teams.extra_side() {
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "{} team received the extra player this round.",
            side.title()
        )));
    }
    embed
}

fn skipped_list(skipped: &[Skipped]) -> String {
    skipped
        .iter()
        .map(Skipped::describe)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn move_summary(report: &MoveReport) -> String {
    let mut lines = Vec::new();
    for team in [&report.red, &report.blue] {
        lines.push(format!(
            "Moved {} {} team member(s) to {}.",
            team.moved.len(),
            team.side,
            channel_mention(team.destination)
        ));
        if !team.skipped.is_empty() {
            lines.push(format!(
                "Skipped {} member(s) for the {} team: {}",
                team.skipped.len(),
                team.side,
                skipped_list(&team.skipped)
            ));
        }
    }
    lines.join("\n")
}

pub fn reconvene_summary(report: &ReconveneReport) -> String {
    let mut lines = vec![format!(
        "Moved {} member(s) back to {}.",
        report.moved.len(),
        channel_mention(report.destination)
    )];
    if !report.skipped.is_empty() {
        lines.push(format!(
            "Skipped {} member(s): {}",
            report.skipped.len(),
            skipped_list(&report.skipped)
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::actions::TeamMove;
    use crate::voice::MoveFailure;

    fn teams() -> Teams {
        Teams {
            red: vec![
                MemberRef::new(3u64, "carol", false),
                MemberRef::new(1u64, "alice", false),
            ],
            blue: vec![MemberRef::new(2u64, "bob", false)],
            red_captain: Some(serenity::UserId::new(1)),
            blue_captain: None,
        }
    }

    #[test]
    fn test_team_field_puts_captain_first() {
        assert_eq!(team_field(&teams(), Side::Red), "⭐ <@1> (Captain)\n<@3>");
        assert_eq!(team_field(&teams(), Side::Blue), "<@2>");
        assert_eq!(team_field_name(&teams(), Side::Red), "🟥 Red Team (2)");
    }

    #[test]
    fn test_empty_team_field() {
        let mut teams = teams();
        teams.blue.clear();
        assert_eq!(team_field(&teams, Side::Blue), "(none)");
    }

    #[test]
    fn test_move_summary_lists_skipped_members() {
        let report = MoveReport {
            red: TeamMove {
                side: Side::Red,
                destination: serenity::ChannelId::new(10),
                moved: vec![serenity::UserId::new(1), serenity::UserId::new(3)],
                skipped: vec![],
            },
            blue: TeamMove {
                side: Side::Blue,
                destination: serenity::ChannelId::new(11),
                moved: vec![],
                skipped: vec![Skipped {
                    member: serenity::UserId::new(2),
                    reason: MoveFailure::MemberLeft,
                }],
            },
        };

        assert_eq!(
            move_summary(&report),
            "Moved 2 red team member(s) to <#10>.\n\
             Moved 0 blue team member(s) to <#11>.\n\
             Skipped 1 member(s) for the blue team: <@2> (not in a voice channel)"
        );
    }

    #[test]
    fn test_reconvene_summary() {
        let report = ReconveneReport {
            destination: serenity::ChannelId::new(5),
            moved: vec![serenity::UserId::new(1)],
            skipped: vec![],
        };
        assert_eq!(reconvene_summary(&report), "Moved 1 member(s) back to <#5>.");
    }
}
