//! Candidate scoring for the replay resolver.
//!
//! Scores are tabulated per element category, with penalties as separate
//! rules. Selection is the highest score at or above the floor; ties go to the
//! earliest element in DOM order.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identify::normalize_whitespace;
use crate::models::{Position, Strategy, TargetDescriptor};
use crate::recording::keyword_regex;

/// Bounding box in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> Position {
        Position::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: &Position) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// A live element reported by the candidate scan
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DomCandidate {
    /// Position in document order
    pub dom_index: usize,
    pub tag_name: String,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Visible text, or the value of button-like inputs
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub editable: bool,
    pub rect: Rect,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl DomCandidate {
    pub fn category(&self) -> Category {
        let tag = self.tag_name.to_lowercase();
        let input_type = self.input_type.as_deref().map(str::to_lowercase);
        let role = self.role.as_deref().map(str::to_lowercase);

        match (tag.as_str(), input_type.as_deref()) {
            ("input" | "button", Some("submit")) => return Category::SubmitControl,
            ("button", _) | ("input", Some("button" | "reset" | "image")) => return Category::Button,
            ("a", _) => return Category::Link,
            ("input" | "textarea" | "select", _) => return Category::Field,
            _ => {}
        }
        match role.as_deref() {
            Some("button") => Category::Button,
            Some("link") => Category::Link,
            Some("textbox" | "combobox" | "searchbox") => Category::Field,
            _ if self.editable => Category::Field,
            _ => Category::Other,
        }
    }

    /// `<tag> "text"` for logs and reports
    pub fn summary(&self) -> String {
        let label = [&self.text, &self.label, &self.aria_label, &self.placeholder, &self.name]
            .into_iter()
            .find_map(|v| v.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or("");
        let mut label: String = label.chars().take(40).collect();
        if label.is_empty() {
            label = format!("@{},{}", self.rect.center().x.round(), self.rect.center().y.round());
        }
        format!("<{}> \"{}\"", self.tag_name.to_lowercase(), label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SubmitControl,
    Button,
    Link,
    Field,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryScore {
    pub exact: i32,
    pub partial: i32,
}

impl CategoryScore {
    const fn new(exact: i32, partial: i32) -> Self {
        Self { exact, partial }
    }

    fn for_match(&self, m: TextMatch) -> i32 {
        match m {
            TextMatch::Exact => self.exact,
            TextMatch::Partial => self.partial,
            TextMatch::None => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TextMatch {
    None,
    Partial,
    Exact,
}

/// Adjustment applied after the category score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    /// The search text names a form field, so a matching link is a decoy
    FieldNameLink,
}

#[derive(Debug, Clone)]
pub struct ScoreTable {
    pub submit: CategoryScore,
    pub button: CategoryScore,
    pub link: CategoryScore,
    pub other: CategoryScore,
    /// Form control whose attribute for the recorded strategy matches
    pub field: CategoryScore,
    /// Form control matched through another of its field attributes
    pub field_alternate: CategoryScore,
    pub position_inside: i32,
    pub position_near: i32,
    pub near_radius: f64,
    /// Score a penalized link ends up with
    pub field_name_link: i32,
    pub floor: i32,
    field_keywords: Option<Regex>,
}

impl ScoreTable {
    pub fn new(field_keywords: &[String]) -> Self {
        Self {
            submit: CategoryScore::new(11, 10),
            button: CategoryScore::new(4, 3),
            link: CategoryScore::new(3, 1),
            other: CategoryScore::new(1, 0),
            field: CategoryScore::new(6, 5),
            field_alternate: CategoryScore::new(4, 3),
            position_inside: 2,
            position_near: 1,
            near_radius: 50.0,
            field_name_link: -2,
            floor: 1,
            field_keywords: keyword_regex(field_keywords),
        }
    }

    fn base(&self, category: Category) -> CategoryScore {
        match category {
            Category::SubmitControl => self.submit,
            Category::Button => self.button,
            Category::Link => self.link,
            Category::Field | Category::Other => self.other,
        }
    }

    fn penalties(&self, query: &str, category: Category) -> Option<Penalty> {
        let names_field = self.field_keywords.as_ref().is_some_and(|re| re.is_match(query));
        (category == Category::Link && names_field).then_some(Penalty::FieldNameLink)
    }

    fn penalized(&self, penalty: Penalty) -> i32 {
        match penalty {
            Penalty::FieldNameLink => self.field_name_link,
        }
    }

    /// Generic text search score (buttons, links, anything with visible text)
    pub fn text_score(&self, query: &str, candidate: &DomCandidate) -> i32 {
        let m = best_match(query, [&candidate.text, &candidate.aria_label]);
        if m == TextMatch::None {
            return 0;
        }
        let category = candidate.category();
        let score = self.base(category).for_match(m);
        match self.penalties(query, category) {
            Some(penalty) => self.penalized(penalty),
            None => score,
        }
    }

    /// Field lookup score; 0 for anything that is not a form control
    pub fn field_score(&self, strategy: Strategy, query: &str, candidate: &DomCandidate) -> i32 {
        if candidate.category() != Category::Field {
            return 0;
        }
        let primary = match strategy {
            Strategy::Label => best_match(query, [&candidate.label]),
            Strategy::Placeholder => best_match(query, [&candidate.placeholder]),
            Strategy::Aria => best_match(query, [&candidate.aria_label]),
            Strategy::TypeContext => best_match(query, [&candidate.context, &candidate.input_type]),
            Strategy::Attribute => best_match(query, [&candidate.name, &candidate.id]),
            Strategy::Text | Strategy::Position => TextMatch::None,
        };
        if primary != TextMatch::None {
            return self.field.for_match(primary);
        }
        let alternate = best_match(
            query,
            [
                &candidate.label,
                &candidate.placeholder,
                &candidate.aria_label,
                &candidate.name,
                &candidate.id,
            ],
        );
        self.field_alternate.for_match(alternate)
    }

    pub fn position_score(&self, point: &Position, candidate: &DomCandidate) -> i32 {
        if candidate.rect.contains(point) {
            self.position_inside
        } else if candidate.rect.center().distance(point) <= self.near_radius {
            self.position_near
        } else {
            0
        }
    }

    /// Picks the element a target refers to
    pub fn select(&self, target: &TargetDescriptor, candidates: &[DomCandidate]) -> Result<Resolution, Unresolved> {
        let visible: Vec<&DomCandidate> = candidates.iter().filter(|c| c.visible).collect();
        let query = target.value.as_str();

        if target.strategy.is_field_lookup() {
            let ranked = self.rank(&visible, |c| self.field_score(target.strategy, query, c));
            if ranked.first().is_some_and(|(_, s)| *s >= self.floor) {
                return Ok(self.resolution(ranked));
            }
        }

        let ranked = if target.strategy == Strategy::Position {
            let point = parse_point(query).or(target.disambiguators.position);
            match point {
                Some(p) => self.rank(&visible, |c| self.position_score(&p, c)),
                None => Vec::new(),
            }
        } else {
            self.rank(&visible, |c| self.text_score(query, c))
        };

        if ranked.first().is_some_and(|(_, s)| *s >= self.floor) {
            Ok(self.resolution(ranked))
        } else {
            Err(Unresolved {
                target: target.clone(),
                considered: considered(&ranked),
            })
        }
    }

    fn rank<'a, F>(&self, candidates: &[&'a DomCandidate], score: F) -> Vec<(&'a DomCandidate, i32)>
    where
        F: Fn(&DomCandidate) -> i32,
    {
        let mut ranked: Vec<(&DomCandidate, i32)> = candidates
            .iter()
            .map(|&c| (c, score(c)))
            .filter(|(_, s)| *s != 0)
            .collect();
        ranked.sort_by(|(a, sa), (b, sb)| sb.cmp(sa).then(a.dom_index.cmp(&b.dom_index)));
        ranked
    }

    fn resolution(&self, ranked: Vec<(&DomCandidate, i32)>) -> Resolution {
        let considered = considered(&ranked);
        let (candidate, score) = ranked[0];
        Resolution {
            candidate: candidate.clone(),
            score,
            considered,
        }
    }
}

impl Default for ScoreTable {
    fn default() -> Self {
        let keywords: Vec<String> = crate::recording::DEFAULT_FIELD_KEYWORDS
            .iter()
            .map(|k| k.to_string())
            .collect();
        Self::new(&keywords)
    }
}

/// One scored candidate, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub dom_index: usize,
    pub summary: String,
    pub score: i32,
}

const MAX_CONSIDERED: usize = 10;

fn considered(ranked: &[(&DomCandidate, i32)]) -> Vec<ScoredCandidate> {
    ranked
        .iter()
        .take(MAX_CONSIDERED)
        .map(|(c, score)| ScoredCandidate {
            dom_index: c.dom_index,
            summary: c.summary(),
            score: *score,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub candidate: DomCandidate,
    pub score: i32,
    pub considered: Vec<ScoredCandidate>,
}

/// No candidate reached the floor
#[derive(Debug, Clone, Serialize)]
pub struct Unresolved {
    pub target: TargetDescriptor,
    pub considered: Vec<ScoredCandidate>,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element not found: {}", self.target)?;
        if self.considered.is_empty() {
            return write!(f, " (no candidates matched)");
        }
        let list: Vec<String> = self
            .considered
            .iter()
            .map(|c| format!("{} score {}", c.summary, c.score))
            .collect();
        write!(f, " (considered: {})", list.join(", "))
    }
}

fn best_match<const N: usize>(query: &str, sources: [&Option<String>; N]) -> TextMatch {
    let query = normalize_whitespace(query).to_lowercase();
    if query.is_empty() {
        return TextMatch::None;
    }
    sources
        .into_iter()
        .filter_map(|s| s.as_deref())
        .map(|s| {
            let s = normalize_whitespace(s).to_lowercase();
            if s == query {
                TextMatch::Exact
            } else if s.contains(&query) {
                TextMatch::Partial
            } else {
                TextMatch::None
            }
        })
        .max()
        .unwrap_or(TextMatch::None)
}

fn parse_point(value: &str) -> Option<Position> {
    let (x, y) = value.split_once(',')?;
    Some(Position::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}
