use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a canonical field is coerced during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Identity,
    Date,
    Numeric,
    /// Productivity rating, always clamped to `SCORE_MIN..=SCORE_MAX`.
    BoundedScore,
    Text,
}

pub const SCORE_MIN: f64 = 1.0;
pub const SCORE_MAX: f64 = 5.0;
pub const SCORE_DEFAULT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalField {
    Name,
    Role,
    WeekStart,
    WeekEnd,
    VideosCreated,
    VideoClients,
    VideoProblems,
    VideoProductivity,
    DesignsCreated,
    DesignTypes,
    DesignClients,
    DesignProblems,
    DesignProductivity,
    ScriptsProduced,
    PostsPublished,
    ClientMeetings,
    MeetingTakeaways,
    AmProblems,
    AmProductivity,
    ProjectsWorked,
    FilmmakerClientsCount,
    FilmmakerClients,
    FilmmakerProblems,
    FilmmakerProductivity,
    LeaderMeetings,
    WeekReview,
    LeaderProblems,
    LeaderProductivity,
    OtherComments,
}

impl CanonicalField {
    /// Every field in resolution priority order.
    pub const ALL: [CanonicalField; 29] = [
        CanonicalField::Name,
        CanonicalField::Role,
        CanonicalField::WeekStart,
        CanonicalField::WeekEnd,
        CanonicalField::VideosCreated,
        CanonicalField::VideoClients,
        CanonicalField::VideoProblems,
        CanonicalField::VideoProductivity,
        CanonicalField::DesignsCreated,
        CanonicalField::DesignTypes,
        CanonicalField::DesignClients,
        CanonicalField::DesignProblems,
        CanonicalField::DesignProductivity,
        CanonicalField::ScriptsProduced,
        CanonicalField::PostsPublished,
        CanonicalField::ClientMeetings,
        CanonicalField::MeetingTakeaways,
        CanonicalField::AmProblems,
        CanonicalField::AmProductivity,
        CanonicalField::ProjectsWorked,
        CanonicalField::FilmmakerClientsCount,
        CanonicalField::FilmmakerClients,
        CanonicalField::FilmmakerProblems,
        CanonicalField::FilmmakerProductivity,
        CanonicalField::LeaderMeetings,
        CanonicalField::WeekReview,
        CanonicalField::LeaderProblems,
        CanonicalField::LeaderProductivity,
        CanonicalField::OtherComments,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            CanonicalField::Name => "Name",
            CanonicalField::Role => "Role",
            CanonicalField::WeekStart => "Week Start Date",
            CanonicalField::WeekEnd => "Week End Date",
            CanonicalField::VideosCreated => "Videos Created",
            CanonicalField::VideoClients => "Video Clients",
            CanonicalField::VideoProblems => "Video Problems",
            CanonicalField::VideoProductivity => "Video Productivity",
            CanonicalField::DesignsCreated => "Designs Created",
            CanonicalField::DesignTypes => "Design Types",
            CanonicalField::DesignClients => "Design Clients",
            CanonicalField::DesignProblems => "Design Problems",
            CanonicalField::DesignProductivity => "Design Productivity",
            CanonicalField::ScriptsProduced => "Scripts Produced",
            CanonicalField::PostsPublished => "Posts Published",
            CanonicalField::ClientMeetings => "Client Meetings",
            CanonicalField::MeetingTakeaways => "Meeting Takeaways",
            CanonicalField::AmProblems => "AM Problems",
            CanonicalField::AmProductivity => "AM Productivity",
            CanonicalField::ProjectsWorked => "Projects Worked",
            CanonicalField::FilmmakerClientsCount => "Filmmaker Clients Count",
            CanonicalField::FilmmakerClients => "Filmmaker Clients",
            CanonicalField::FilmmakerProblems => "Filmmaker Problems",
            CanonicalField::FilmmakerProductivity => "Filmmaker Productivity",
            CanonicalField::LeaderMeetings => "Leader Meetings",
            CanonicalField::WeekReview => "Week Review",
            CanonicalField::LeaderProblems => "Leader Problems",
            CanonicalField::LeaderProductivity => "Leader Productivity",
            CanonicalField::OtherComments => "Other Comments",
        }
    }

    pub fn from_canonical_name(name: &str) -> Option<CanonicalField> {
        CanonicalField::ALL
            .iter()
            .copied()
            .find(|field| field.canonical_name() == name)
    }

    pub fn kind(self) -> FieldKind {
        match self {
            CanonicalField::Name | CanonicalField::Role => FieldKind::Identity,
            CanonicalField::WeekStart | CanonicalField::WeekEnd => FieldKind::Date,
            CanonicalField::VideosCreated
            | CanonicalField::DesignsCreated
            | CanonicalField::ScriptsProduced
            | CanonicalField::PostsPublished
            | CanonicalField::ClientMeetings
            | CanonicalField::ProjectsWorked
            | CanonicalField::FilmmakerClientsCount
            | CanonicalField::LeaderMeetings => FieldKind::Numeric,
            CanonicalField::VideoProductivity
            | CanonicalField::DesignProductivity
            | CanonicalField::AmProductivity
            | CanonicalField::FilmmakerProductivity
            | CanonicalField::LeaderProductivity => FieldKind::BoundedScore,
            _ => FieldKind::Text,
        }
    }

    pub fn is_problem_field(self) -> bool {
        matches!(
            self,
            CanonicalField::VideoProblems
                | CanonicalField::DesignProblems
                | CanonicalField::AmProblems
                | CanonicalField::FilmmakerProblems
                | CanonicalField::LeaderProblems
        )
    }

    pub fn numeric_fields() -> impl Iterator<Item = CanonicalField> {
        Self::of_kind(FieldKind::Numeric)
    }

    pub fn score_fields() -> impl Iterator<Item = CanonicalField> {
        Self::of_kind(FieldKind::BoundedScore)
    }

    fn of_kind(kind: FieldKind) -> impl Iterator<Item = CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(move |field| field.kind() == kind)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Acceptable raw header substrings per canonical field, matched
/// case-insensitively in registration order.
#[derive(Debug, Clone)]
pub struct AliasTable {
    aliases: BTreeMap<CanonicalField, Vec<String>>,
}

impl Default for AliasTable {
    fn default() -> Self {
        use CanonicalField::*;

        // Survey forms reuse the same question text across roles, so the
        // role-specific variants further down only ever win through their
        // snake_case export names.
        let builtin: [(CanonicalField, &[&str]); 29] = [
            (Name, &["Name", "name", "Employee Name", "employee_name"]),
            (Role, &["Role", "role", "Position", "position"]),
            (WeekStart, &["Week Start Date", "week_start", "start_date", "Week Start"]),
            (WeekEnd, &["Week End Date", "week_end", "end_date", "Week End"]),
            (
                VideosCreated,
                &["How many videos did you create this week?", "videos_created", "videos"],
            ),
            (VideoClients, &["Which clients did you work for this week?", "video_clients"]),
            (VideoProblems, &["Did you face any problems this week?", "video_problems"]),
            (VideoProductivity, &["Overall productivity this week", "video_productivity"]),
            (
                DesignsCreated,
                &["How many designs did you create this week?", "designs_created", "designs"],
            ),
            (DesignTypes, &["What types of designs did you make?", "design_types"]),
            (DesignClients, &["Which clients did you work for this week?", "design_clients"]),
            (DesignProblems, &["Did you face any problems this week?", "design_problems"]),
            (DesignProductivity, &["Overall productivity this week", "design_productivity"]),
            (
                ScriptsProduced,
                &["How many scripts did you produce this week?", "scripts_produced", "scripts"],
            ),
            (
                PostsPublished,
                &["How many posts were published this week?", "posts_published", "posts"],
            ),
            (
                ClientMeetings,
                &[
                    "How many client meetings did you attend this week?",
                    "client_meetings",
                    "meetings",
                ],
            ),
            (
                MeetingTakeaways,
                &["Main takeaway from this week's client meetings", "meeting_takeaways"],
            ),
            (AmProblems, &["Did you face any problems this week?", "am_problems"]),
            (AmProductivity, &["Overall productivity this week", "am_productivity"]),
            (
                ProjectsWorked,
                &["How many projects did you work on this week?", "projects_worked", "projects"],
            ),
            (
                FilmmakerClientsCount,
                &["How many clients did you work with this week?", "filmmaker_clients_count"],
            ),
            (FilmmakerClients, &["Who were the clients?", "filmmaker_clients"]),
            (FilmmakerProblems, &["Did you face any problems this week?", "filmmaker_problems"]),
            (
                FilmmakerProductivity,
                &["Overall productivity this week", "filmmaker_productivity"],
            ),
            (
                LeaderMeetings,
                &["How many client meetings did you have this week?", "leader_meetings"],
            ),
            (WeekReview, &["Review of this week overall", "week_review"]),
            (LeaderProblems, &["Did you face any problems this week?", "leader_problems"]),
            (LeaderProductivity, &["Overall productivity this week", "leader_productivity"]),
            (OtherComments, &["Any other comments?", "other_comments", "additional_comments"]),
        ];

        let aliases = builtin
            .into_iter()
            .map(|(field, names)| {
                let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
                (field, names)
            })
            .collect();

        Self { aliases }
    }
}

impl AliasTable {
    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Appends aliases after the existing ones, so earlier registrations
    /// keep their priority. Duplicates and blank strings are ignored.
    pub fn extend<I, S>(&mut self, field: CanonicalField, extra: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.aliases.entry(field).or_default();
        for alias in extra {
            let alias = alias.into();
            if alias.trim().is_empty() || entry.iter().any(|known| known == &alias) {
                continue;
            }
            entry.push(alias);
        }
    }
}

/// Result of schema resolution: which raw column feeds which field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnMap {
    bindings: Vec<(usize, String, CanonicalField)>,
    unmapped: Vec<String>,
}

impl ColumnMap {
    /// Field bound to the first column carrying this header.
    pub fn field_for(&self, raw_column: &str) -> Option<CanonicalField> {
        self.bindings
            .iter()
            .find(|(_, column, _)| column == raw_column)
            .map(|(_, _, field)| *field)
    }

    /// Field bound to the column at `index`.
    pub fn field_at(&self, index: usize) -> Option<CanonicalField> {
        self.bindings
            .iter()
            .find(|(idx, _, _)| *idx == index)
            .map(|(_, _, field)| *field)
    }

    pub fn column_for(&self, field: CanonicalField) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, _, bound)| *bound == field)
            .map(|(_, column, _)| column.as_str())
    }

    /// Bindings in input column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, CanonicalField)> {
        self.bindings
            .iter()
            .map(|(_, column, field)| (column.as_str(), *field))
    }

    /// Bindings as column positions, in input column order.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, CanonicalField)> + '_ {
        self.bindings.iter().map(|(idx, _, field)| (*idx, *field))
    }

    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Maps raw headers onto canonical fields: exact canonical names first,
/// then an ordered case-insensitive substring scan over each field's
/// aliases. Never fails; fields without a match are simply absent.
pub fn resolve<S: AsRef<str>>(raw_columns: &[S], aliases: &AliasTable) -> ColumnMap {
    let names: Vec<&str> = raw_columns.iter().map(|column| column.as_ref()).collect();
    let lowered: Vec<String> = names.iter().map(|name| name.to_lowercase()).collect();
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut found: Vec<(usize, CanonicalField)> = Vec::new();

    for field in CanonicalField::ALL {
        let exact = names
            .iter()
            .enumerate()
            .position(|(idx, name)| !claimed.contains(&idx) && *name == field.canonical_name());

        let matched = exact.or_else(|| {
            let field_aliases: Vec<String> = aliases
                .aliases(field)
                .iter()
                .map(|alias| alias.to_lowercase())
                .collect();
            lowered.iter().enumerate().position(|(idx, column)| {
                !claimed.contains(&idx)
                    && field_aliases.iter().any(|alias| column.contains(alias.as_str()))
            })
        });

        if let Some(idx) = matched {
            debug!(
                column = names[idx],
                field = field.canonical_name(),
                "resolved column"
            );
            claimed.insert(idx);
            found.push((idx, field));
        }
    }

    found.sort_by_key(|(idx, _)| *idx);
    let bindings = found
        .into_iter()
        .map(|(idx, field)| (idx, names[idx].to_string(), field))
        .collect();
    let unmapped = names
        .iter()
        .enumerate()
        .filter(|(idx, _)| !claimed.contains(idx))
        .map(|(_, name)| name.to_string())
        .collect();

    ColumnMap { bindings, unmapped }
}
