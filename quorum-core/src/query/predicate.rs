//! Compiled predicates and their evaluation against a change snapshot

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use regex::Regex;

use super::QueryError;
use crate::model::{AccountId, Change, FileChange};

/// Evaluation inputs that are not part of the change itself
#[derive(Debug, Clone)]
pub struct MatchScope {
    /// Reference instant for `age`
    pub now: DateTime<Utc>,
    /// Members of groups referenced by `ownerin` / `reviewerin`
    pub groups: HashMap<String, HashSet<AccountId>>,
    /// Named destinations: name -> full ref names
    pub destinations: HashMap<String, Vec<String>>,
}

impl Default for MatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchScope {
    pub fn new() -> Self {
        Self {
            now: Utc::now(),
            groups: HashMap::new(),
            destinations: HashMap::new(),
        }
    }

    /// Evaluate time operators as of `now`
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Record the members of a group
    pub fn with_group(
        mut self,
        group: impl Into<String>,
        members: impl IntoIterator<Item = AccountId>,
    ) -> Self {
        self.groups
            .insert(group.into(), members.into_iter().collect());
        self
    }

    /// Record a named destination; short branch names are expanded to refs
    pub fn with_destination(
        mut self,
        name: impl Into<String>,
        refs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let refs = refs.into_iter().map(|r| full_ref(&r.into())).collect();
        self.destinations.insert(name.into(), refs);
        self
    }

    fn in_group(&self, group: &str, id: AccountId) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(&id))
    }
}

/// A change seen through an optional path filter
///
/// Predicates only ever look at `files`, so a rule with excluded paths can
/// hide some of them without touching the underlying change.
#[derive(Debug, Clone)]
pub struct ChangeView<'a> {
    pub change: &'a Change,
    pub files: Vec<&'a FileChange>,
}

impl<'a> ChangeView<'a> {
    /// View with every touched file visible
    pub fn new(change: &'a Change) -> Self {
        Self {
            change,
            files: change.files.iter().collect(),
        }
    }

    fn paths(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.files.iter().flat_map(|&f: &&'a FileChange| {
            let renamed_from = f.old_path.as_deref().filter(move |old| *old != f.path);
            std::iter::once(f.path.as_str()).chain(renamed_from)
        })
    }

    fn insertions(&self) -> i64 {
        self.files.iter().map(|f| i64::from(f.insertions)).sum()
    }

    fn deletions(&self) -> i64 {
        self.files.iter().map(|f| i64::from(f.deletions)).sum()
    }
}

/// A compiled filter expression
#[derive(Debug, Clone)]
pub enum Predicate {
    /// The wildcard rule
    Always,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Leaf(Leaf),
}

impl Predicate {
    /// Evaluate against a (possibly filtered) change view
    pub fn matches(&self, view: &ChangeView<'_>, scope: &MatchScope) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::And(children) => children.iter().all(|p| p.matches(view, scope)),
            Predicate::Or(children) => children.iter().any(|p| p.matches(view, scope)),
            Predicate::Not(inner) => !inner.matches(view, scope),
            Predicate::Leaf(leaf) => leaf.matches(view, scope),
        }
    }

    /// Evaluate against the whole change
    pub fn matches_change(&self, change: &Change, scope: &MatchScope) -> bool {
        self.matches(&ChangeView::new(change), scope)
    }

    /// Groups whose membership is needed to evaluate this predicate
    pub fn referenced_groups(&self) -> BTreeSet<String> {
        let mut groups = BTreeSet::new();
        self.collect_groups(&mut groups);
        groups
    }

    fn collect_groups(&self, out: &mut BTreeSet<String>) {
        match self {
            Predicate::Always => {}
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_groups(out);
                }
            }
            Predicate::Not(inner) => inner.collect_groups(out),
            Predicate::Leaf(Leaf::OwnerIn(group)) | Predicate::Leaf(Leaf::ReviewerIn(group)) => {
                out.insert(group.clone());
            }
            Predicate::Leaf(_) => {}
        }
    }
}

/// Exact string or anchored regular expression (values starting with `^`)
#[derive(Debug, Clone)]
pub enum Pattern {
    Exact(String),
    Regex(Regex),
}

impl Pattern {
    fn parse(value: &str) -> Result<Self, QueryError> {
        match value.strip_prefix('^') {
            Some(body) => Ok(Pattern::Regex(anchored_regex(body)?)),
            None => Ok(Pattern::Exact(value.to_string())),
        }
    }

    fn is_match(&self, candidate: &str) -> bool {
        match self {
            Pattern::Exact(s) => s == candidate,
            Pattern::Regex(re) => re.is_match(candidate),
        }
    }
}

/// Compile a regular expression that must match the whole input
pub(crate) fn anchored_regex(body: &str) -> Result<Regex, QueryError> {
    let body = body.strip_prefix('^').unwrap_or(body);
    Regex::new(&format!("^(?:{})$", body))
        .map_err(|e| QueryError::Malformed(format!("invalid regular expression: {}", e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Numeric comparison such as `>=10`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub op: CmpOp,
    pub value: i64,
}

impl Comparison {
    fn parse(value: &str) -> Result<Self, QueryError> {
        let (op, rest) = split_cmp_op(value);
        let number = rest
            .trim()
            .parse::<i64>()
            .map_err(|_| QueryError::Malformed(format!("invalid comparison \"{}\"", value)))?;
        Ok(Self {
            op: op.unwrap_or(CmpOp::Eq),
            value: number,
        })
    }

    fn holds(&self, actual: i64) -> bool {
        match self.op {
            CmpOp::Eq => actual == self.value,
            CmpOp::Gt => actual > self.value,
            CmpOp::Ge => actual >= self.value,
            CmpOp::Lt => actual < self.value,
            CmpOp::Le => actual <= self.value,
        }
    }
}

fn split_cmp_op(value: &str) -> (Option<CmpOp>, &str) {
    for (prefix, op) in [
        (">=", CmpOp::Ge),
        ("<=", CmpOp::Le),
        (">", CmpOp::Gt),
        ("<", CmpOp::Lt),
        ("=", CmpOp::Eq),
    ] {
        if let Some(rest) = value.strip_prefix(prefix) {
            return (Some(op), rest);
        }
    }
    (None, value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Open,
    Merged,
    Abandoned,
    Closed,
}

/// `label:` operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFilter {
    pub name: String,
    /// `None` matches any non-zero vote
    pub vote: Option<Comparison>,
}

/// A single operator with its parsed value
#[derive(Debug, Clone)]
pub enum Leaf {
    Branch(Pattern),
    Ref(Pattern),
    Destination(String),
    File(Pattern),
    Path(Pattern),
    Dir(Pattern),
    Extension(String),
    OnlyExtensions(BTreeSet<String>),
    Author(String),
    Committer(String),
    Reviewer(String),
    Assignee(String),
    ReviewerIn(String),
    OwnerIn(String),
    Status(StatusFilter),
    Wip(bool),
    Topic(Pattern),
    InTopic(Pattern),
    Hashtag(String),
    Label(LabelFilter),
    Added(Comparison),
    Deleted(Comparison),
    Delta(Comparison),
    Unresolved(Comparison),
    Age(TimeDelta),
    Before(DateTime<Utc>),
    After(DateTime<Utc>),
    Footer { key: String, value: Option<String> },
    Submittable(bool),
}

impl Leaf {
    /// Parse the value of an allow-listed operator
    pub(crate) fn parse(operator: &str, value: &str) -> Result<Self, QueryError> {
        let leaf = match operator {
            "branch" => {
                let short = value.strip_prefix("refs/heads/").unwrap_or(value);
                Leaf::Branch(Pattern::parse(short)?)
            }
            "ref" => Leaf::Ref(Pattern::parse(value)?),
            "destination" => Leaf::Destination(value.to_string()),
            "file" | "f" => Leaf::File(Pattern::parse(value)?),
            "path" => Leaf::Path(Pattern::parse(value)?),
            "dir" | "directory" => {
                let trimmed = value.trim_matches('/');
                if trimmed.is_empty() {
                    return Err(QueryError::Malformed(format!("invalid directory \"{}\"", value)));
                }
                Leaf::Dir(Pattern::parse(trimmed)?)
            }
            "ext" | "extension" => Leaf::Extension(normalize_ext(value)),
            "onlyextensions" | "onlyexts" => {
                Leaf::OnlyExtensions(value.split(',').map(normalize_ext).collect())
            }
            "author" => Leaf::Author(value.to_string()),
            "committer" => Leaf::Committer(value.to_string()),
            "reviewer" | "r" => Leaf::Reviewer(value.to_string()),
            "assignee" => Leaf::Assignee(value.to_string()),
            "reviewerin" => Leaf::ReviewerIn(value.to_string()),
            "ownerin" => Leaf::OwnerIn(value.to_string()),
            "status" => Leaf::Status(match value.to_ascii_lowercase().as_str() {
                "open" | "new" | "pending" => StatusFilter::Open,
                "merged" => StatusFilter::Merged,
                "abandoned" => StatusFilter::Abandoned,
                "closed" => StatusFilter::Closed,
                _ => return Err(malformed(operator, value)),
            }),
            "wip" => Leaf::Wip(parse_bool(value).ok_or_else(|| malformed(operator, value))?),
            "topic" => Leaf::Topic(Pattern::parse(value)?),
            "intopic" => Leaf::InTopic(match value.strip_prefix('^') {
                Some(body) => Pattern::Regex(anchored_regex(body)?),
                None => Pattern::Exact(value.to_lowercase()),
            }),
            "hashtag" => Leaf::Hashtag(value.trim_start_matches('#').to_lowercase()),
            "label" => Leaf::Label(parse_label(value)?),
            "added" => Leaf::Added(Comparison::parse(value)?),
            "deleted" => Leaf::Deleted(Comparison::parse(value)?),
            "delta" | "size" => Leaf::Delta(Comparison::parse(value)?),
            "unresolved" => Leaf::Unresolved(Comparison::parse(value)?),
            "age" => {
                let duration = humantime::parse_duration(value)
                    .map_err(|e| QueryError::Malformed(format!("invalid age \"{}\": {}", value, e)))?;
                let delta = TimeDelta::from_std(duration)
                    .map_err(|_| QueryError::Malformed(format!("age out of range \"{}\"", value)))?;
                Leaf::Age(delta)
            }
            "before" => Leaf::Before(parse_instant(value)?),
            "after" => Leaf::After(parse_instant(value)?),
            "footer" => {
                let (key, footer_value) = match value.split_once('=').or_else(|| value.split_once(':')) {
                    Some((k, v)) => (k.trim(), Some(v.trim().to_string())),
                    None => (value.trim(), None),
                };
                if key.is_empty() {
                    return Err(malformed(operator, value));
                }
                Leaf::Footer {
                    key: key.to_string(),
                    value: footer_value,
                }
            }
            "submittable" => Leaf::Submittable(match value.to_ascii_lowercase().as_str() {
                "ok" => true,
                "not_ready" => false,
                _ => return Err(malformed(operator, value)),
            }),
            other => return Err(QueryError::UnsupportedOperator(other.to_string())),
        };
        Ok(leaf)
    }

    fn matches(&self, view: &ChangeView<'_>, scope: &MatchScope) -> bool {
        let change = view.change;
        match self {
            Leaf::Branch(pattern) => {
                pattern.is_match(change.branch.strip_prefix("refs/heads/").unwrap_or(&change.branch))
            }
            Leaf::Ref(pattern) => pattern.is_match(&change.ref_name()),
            Leaf::Destination(name) => {
                let target = change.ref_name();
                scope
                    .destinations
                    .get(name)
                    .is_some_and(|refs| refs.iter().any(|r| *r == target))
            }
            Leaf::File(pattern) => view.paths().any(|path| match pattern {
                Pattern::Exact(value) => path == value || contains_components(path, value),
                Pattern::Regex(re) => re.is_match(path),
            }),
            Leaf::Path(pattern) => view.paths().any(|path| pattern.is_match(path)),
            Leaf::Dir(pattern) => view.paths().any(|path| {
                let Some((dir, _)) = path.rsplit_once('/') else {
                    return false;
                };
                match pattern {
                    Pattern::Exact(value) => contains_components(dir, value),
                    Pattern::Regex(re) => ancestors(dir).any(|d| re.is_match(d)),
                }
            }),
            Leaf::Extension(ext) => view
                .files
                .iter()
                .any(|f| f.extension().unwrap_or_default() == *ext),
            Leaf::OnlyExtensions(exts) => {
                if view.files.is_empty() {
                    return false;
                }
                let touched: BTreeSet<String> = view
                    .files
                    .iter()
                    .map(|f| f.extension().unwrap_or_default())
                    .collect();
                touched == *exts
            }
            Leaf::Author(value) => change.author.is_named_by(value),
            Leaf::Committer(value) => change.committer.is_named_by(value),
            Leaf::Reviewer(value) => change.reviewers.iter().any(|a| a.is_named_by(value)),
            Leaf::Assignee(value) => change
                .assignee
                .as_ref()
                .is_some_and(|a| a.is_named_by(value)),
            Leaf::ReviewerIn(group) => change.reviewers.iter().any(|a| scope.in_group(group, a.id)),
            Leaf::OwnerIn(group) => scope.in_group(group, change.owner.id),
            Leaf::Status(filter) => match filter {
                StatusFilter::Open => change.status.is_open(),
                StatusFilter::Closed => !change.status.is_open(),
                StatusFilter::Merged => change.status == crate::model::ChangeStatus::Merged,
                StatusFilter::Abandoned => change.status == crate::model::ChangeStatus::Abandoned,
            },
            Leaf::Wip(wip) => change.work_in_progress == *wip,
            Leaf::Topic(pattern) => change.topic.as_deref().is_some_and(|t| pattern.is_match(t)),
            Leaf::InTopic(pattern) => change.topic.as_deref().is_some_and(|t| match pattern {
                Pattern::Exact(needle) => t.to_lowercase().contains(needle.as_str()),
                Pattern::Regex(re) => re.is_match(t),
            }),
            Leaf::Hashtag(tag) => change.hashtags.iter().any(|h| h.to_lowercase() == *tag),
            Leaf::Label(filter) => change.labels.iter().any(|vote| {
                vote.label.eq_ignore_ascii_case(&filter.name)
                    && match filter.vote {
                        Some(cmp) => cmp.holds(i64::from(vote.value)),
                        None => vote.value != 0,
                    }
            }),
            Leaf::Added(cmp) => cmp.holds(view.insertions()),
            Leaf::Deleted(cmp) => cmp.holds(view.deletions()),
            Leaf::Delta(cmp) => cmp.holds(view.insertions() + view.deletions()),
            Leaf::Unresolved(cmp) => cmp.holds(i64::from(change.unresolved_comments)),
            Leaf::Age(min_age) => scope.now.signed_duration_since(change.updated) >= *min_age,
            Leaf::Before(instant) => change.updated <= *instant,
            Leaf::After(instant) => change.updated >= *instant,
            Leaf::Footer { key, value } => change.footers().iter().any(|(k, v)| {
                k.eq_ignore_ascii_case(key)
                    && value.as_deref().map_or(true, |want| v.eq_ignore_ascii_case(want))
            }),
            Leaf::Submittable(ok) => change.submittable == *ok,
        }
    }
}

fn malformed(operator: &str, value: &str) -> QueryError {
    QueryError::Malformed(format!("invalid value for {}: \"{}\"", operator, value))
}

fn normalize_ext(value: &str) -> String {
    value.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// `Name`, `Name+1`, `Name-1`, `Name=1`, `Name>=1`, ...
static LABEL_VOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[^=<>+]+?)(?P<op>>=|<=|=|>|<)?(?P<value>[+-]?\d+)$").expect("constant pattern")
});

fn parse_label(value: &str) -> Result<LabelFilter, QueryError> {
    if value.contains(',') {
        return Err(QueryError::Malformed(format!(
            "label qualifiers are not supported: \"{}\"",
            value
        )));
    }

    let Some(caps) = LABEL_VOTE_RE.captures(value) else {
        return Ok(LabelFilter {
            name: value.to_string(),
            vote: None,
        });
    };

    let (op, _) = split_cmp_op(caps.name("op").map_or("", |m| m.as_str()));
    let number = caps["value"]
        .parse::<i64>()
        .map_err(|_| malformed("label", value))?;
    Ok(LabelFilter {
        name: caps["name"].to_string(),
        vote: Some(Comparison {
            op: op.unwrap_or(CmpOp::Eq),
            value: number,
        }),
    })
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, QueryError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| QueryError::Malformed(format!("invalid date \"{}\"", value)))
}

fn full_ref(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_string()
    } else {
        format!("refs/heads/{}", name)
    }
}

/// Whether `needle`'s components appear as a contiguous run in `path`
fn contains_components(path: &str, needle: &str) -> bool {
    let haystack: Vec<&str> = path.split('/').collect();
    let needle: Vec<&str> = needle.trim_matches('/').split('/').collect();
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// `a/b/c` -> `a`, `a/b`, `a/b/c`
fn ancestors(dir: &str) -> impl Iterator<Item = &str> {
    dir.match_indices('/')
        .map(move |(i, _)| &dir[..i])
        .chain(std::iter::once(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, ChangeKind, ChangeStatus, LabelVote, Person};
    use crate::query::compile;

    fn change() -> Change {
        Change::new(7, "demo", "main", Account::new(1, "carol"))
            .with_file(FileChange::new("src/core/lib.rs", ChangeKind::Modified).with_lines(10, 4))
            .with_file(FileChange::new("docs/guide.md", ChangeKind::Added).with_lines(20, 0))
            .with_author(Person::new("Jane Doe", "jdoe@example.com"))
    }

    fn eval(expr: &str, change: &Change) -> bool {
        compile(expr).unwrap().matches_change(change, &MatchScope::new())
    }

    #[test]
    fn test_branch_and_ref() {
        let c = change();
        assert!(eval("branch:main", &c));
        assert!(eval("branch:refs/heads/main", &c));
        assert!(eval("branch:^ma.*", &c));
        assert!(!eval("branch:mai", &c));
        assert!(eval("ref:refs/heads/main", &c));
    }

    #[test]
    fn test_file_path_and_dir() {
        let c = change();
        assert!(eval("file:src/core/lib.rs", &c));
        assert!(eval("file:core", &c));
        assert!(eval("file:core/lib.rs", &c));
        assert!(!eval("file:cor", &c));
        assert!(eval(r"file:^src/.*\.rs", &c));
        assert!(eval("path:docs/guide.md", &c));
        assert!(!eval("path:guide.md", &c));
        assert!(eval("dir:src", &c));
        assert!(eval("dir:src/core/", &c));
        assert!(!eval("dir:lib.rs", &c));
        assert!(eval("directory:^src/c.*", &c));
    }

    #[test]
    fn test_extensions() {
        let c = change();
        assert!(eval("ext:rs", &c));
        assert!(eval("extension:.MD", &c));
        assert!(!eval("ext:txt", &c));
        assert!(eval("onlyexts:md,rs", &c));
        assert!(!eval("onlyextensions:rs", &c));
    }

    #[test]
    fn test_people() {
        let mut c = change().with_reviewer(Account::new(2, "alice").with_email("alice@example.com"));
        c.assignee = Some(Account::new(3, "bob"));
        assert!(eval("author:jdoe", &c));
        assert!(eval("committer:jdoe@example.com", &c));
        assert!(eval("reviewer:alice@example.com", &c));
        assert!(eval("r:2", &c));
        assert!(eval("assignee:bob", &c));
        assert!(!eval("assignee:alice", &c));
    }

    #[test]
    fn test_groups_come_from_scope() {
        let c = change().with_reviewer(Account::new(2, "alice"));
        let scope = MatchScope::new()
            .with_group("core", [AccountId(1)])
            .with_group("docs", [AccountId(2)]);

        let p = compile("ownerin:core reviewerin:docs").unwrap();
        assert!(p.matches_change(&c, &scope));
        assert!(!compile("ownerin:docs").unwrap().matches_change(&c, &scope));
        assert_eq!(
            p.referenced_groups().into_iter().collect::<Vec<_>>(),
            vec!["core".to_string(), "docs".to_string()]
        );
    }

    #[test]
    fn test_destination() {
        let c = change();
        let scope = MatchScope::new().with_destination("stable", ["main", "refs/heads/stable"]);
        assert!(compile("destination:stable").unwrap().matches_change(&c, &scope));
        assert!(!compile("destination:other").unwrap().matches_change(&c, &scope));
    }

    #[test]
    fn test_status_and_wip() {
        let mut c = change();
        assert!(eval("status:open", &c));
        assert!(eval("wip:false", &c));
        c.status = ChangeStatus::Merged;
        c.work_in_progress = true;
        assert!(eval("status:merged", &c));
        assert!(eval("status:closed", &c));
        assert!(eval("wip:yes", &c));
    }

    #[test]
    fn test_topic_and_hashtag() {
        let c = change().with_topic("Release-Prep").with_hashtag("Perf");
        assert!(eval("topic:Release-Prep", &c));
        assert!(eval("intopic:release", &c));
        assert!(eval("topic:^Release.*", &c));
        assert!(eval("hashtag:#perf", &c));
        assert!(!eval("topic:release", &c));
    }

    #[test]
    fn test_labels() {
        let mut c = change();
        c.labels.push(LabelVote {
            label: "Code-Review".into(),
            value: 2,
            account: AccountId(2),
        });
        c.labels.push(LabelVote {
            label: "Verified".into(),
            value: -1,
            account: AccountId(3),
        });
        assert!(eval("label:Code-Review", &c));
        assert!(eval("label:Code-Review+2", &c));
        assert!(eval("label:Code-Review=2", &c));
        assert!(eval("label:Code-Review>=1", &c));
        assert!(!eval("label:Code-Review<2", &c));
        assert!(eval("label:Verified-1", &c));
        assert!(!eval("label:Verified+1", &c));
        assert!(!eval("label:Other", &c));
    }

    #[test]
    fn test_parse_label_forms() {
        assert_eq!(
            parse_label("Code-Review-1").unwrap(),
            LabelFilter {
                name: "Code-Review".into(),
                vote: Some(Comparison { op: CmpOp::Eq, value: -1 })
            }
        );
        assert_eq!(
            parse_label("Code-Review").unwrap(),
            LabelFilter {
                name: "Code-Review".into(),
                vote: None
            }
        );
        assert_eq!(
            parse_label("Verified<=0").unwrap().vote,
            Some(Comparison { op: CmpOp::Le, value: 0 })
        );
        assert!(parse_label("Code-Review+1,user=alice").is_err());
    }

    #[test]
    fn test_size_comparisons() {
        let c = change();
        assert!(eval("added:30", &c));
        assert!(eval("added:>=30", &c));
        assert!(eval("deleted:<5", &c));
        assert!(eval("delta:>33", &c));
        assert!(eval("size:34", &c));
        assert!(eval("unresolved:0", &c));
        assert!(matches!(compile("added:>x"), Err(QueryError::Malformed(_))));
    }

    #[test]
    fn test_time_operators() {
        let mut c = change();
        c.updated = "2024-03-01T12:00:00Z".parse().unwrap();
        let scope = MatchScope::new().at("2024-03-05T12:00:00Z".parse().unwrap());

        assert!(compile("age:3d").unwrap().matches_change(&c, &scope));
        assert!(!compile("age:1week").unwrap().matches_change(&c, &scope));
        assert!(eval("before:2024-03-02", &c));
        assert!(eval("after:2024-03-01", &c));
        assert!(!eval("after:2024-03-01T13:00:00Z", &c));
        assert!(matches!(compile("before:yesterday"), Err(QueryError::Malformed(_))));
        assert!(matches!(compile("age:soon"), Err(QueryError::Malformed(_))));
    }

    #[test]
    fn test_footer_and_submittable() {
        let mut c = change().with_message("Subject\n\nBug: 42\nChange-Type: fix\n");
        assert!(eval("footer:bug", &c));
        assert!(eval("footer:Bug=42", &c));
        assert!(eval(r#"footer:"Change-Type: fix""#, &c));
        assert!(!eval("footer:Bug=43", &c));
        assert!(eval("submittable:not_ready", &c));
        c.submittable = true;
        assert!(eval("submittable:ok", &c));
    }

    #[test]
    fn test_view_hides_files() {
        let c = change();
        let p = compile("file:^docs/.*").unwrap();
        let mut view = ChangeView::new(&c);
        assert!(p.matches(&view, &MatchScope::new()));
        view.files.retain(|f| !f.path.starts_with("docs/"));
        assert!(!p.matches(&view, &MatchScope::new()));
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(ancestors("a/b/c").collect::<Vec<_>>(), vec!["a", "a/b", "a/b/c"]);
        assert_eq!(ancestors("a").collect::<Vec<_>>(), vec!["a"]);
    }
}
