//! User rule matching.
//!
//! A rule file is `{"rules": [...]}` or a bare array. Each rule is a
//! conjunction of optional conditions; the first rule whose conditions all
//! hold decides the action. A rule with `any` set matches everything; a rule
//! without any applicable condition matches nothing.

use std::path::Path;

use serde::Deserialize;
use smallvec::SmallVec;

use crate::config::{load_json, ConfigError};
use crate::decl::DeclKind;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[serde(alias = "include")]
    Trap,
    #[serde(alias = "exclude")]
    Skip,
}

/// One rule as written in the rule file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleSpec {
    pub any: bool,
    pub kind: Option<String>,
    pub pkg: Option<String>,
    pub name: Option<String>,
    pub stdlib: Option<bool>,
    pub main_module: Option<bool>,
    pub generic: Option<bool>,
    pub exported: Option<bool>,
    pub action: Option<Action>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    Wrapped { rules: Vec<RuleSpec> },
    Bare(Vec<RuleSpec>),
}

/// A `*`-wildcard pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Any,
}

impl Pattern {
    pub fn parse(text: &str) -> Self {
        if text == "*" {
            return Pattern::Any;
        }
        match (text.strip_prefix('*'), text.strip_suffix('*')) {
            (Some(_), Some(_)) => Pattern::Contains(text[1..text.len() - 1].to_string()),
            (Some(rest), None) => Pattern::Suffix(rest.to_string()),
            (None, Some(rest)) => Pattern::Prefix(rest.to_string()),
            (None, None) => Pattern::Exact(text.to_string()),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Exact(p) => text == p,
            Pattern::Prefix(p) => text.starts_with(p.as_str()),
            Pattern::Suffix(p) => text.ends_with(p.as_str()),
            Pattern::Contains(p) => text.contains(p.as_str()),
            Pattern::Any => true,
        }
    }
}

type Patterns = SmallVec<[Pattern; 2]>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum KindMatch {
    /// Functions and methods.
    Func,
    Method,
    Var,
    VarPtr,
    Const,
    Interface,
}

impl KindMatch {
    fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "func" => KindMatch::Func,
            "method" => KindMatch::Method,
            "var" => KindMatch::Var,
            "var_ptr" => KindMatch::VarPtr,
            "const" => KindMatch::Const,
            "interface" => KindMatch::Interface,
            _ => return None,
        })
    }

    fn matches(self, kind: DeclKind) -> bool {
        match self {
            KindMatch::Func => kind.is_func(),
            KindMatch::Method => kind == DeclKind::Method,
            KindMatch::Var => kind == DeclKind::Var,
            KindMatch::VarPtr => kind == DeclKind::VarPtr,
            KindMatch::Const => kind == DeclKind::Const,
            KindMatch::Interface => kind == DeclKind::Interface,
        }
    }
}

/// What a rule is matched against.
#[derive(Copy, Clone, Debug)]
pub struct Subject<'a> {
    pub kind: DeclKind,
    pub pkg: &'a str,
    pub name: &'a str,
    pub identity_name: &'a str,
    pub stdlib: bool,
    pub main_module: bool,
    pub generic: bool,
    pub exported: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    any: bool,
    kinds: SmallVec<[KindMatch; 2]>,
    pkgs: Patterns,
    names: Patterns,
    stdlib: Option<bool>,
    main_module: Option<bool>,
    generic: Option<bool>,
    exported: Option<bool>,
    action: Action,
}

impl Rule {
    pub fn compile(spec: &RuleSpec) -> Result<Self, String> {
        let mut kinds = SmallVec::new();
        for kind in split_list(spec.kind.as_deref()) {
            kinds.push(KindMatch::parse(kind).ok_or_else(|| format!("unknown kind `{kind}`"))?);
        }
        Ok(Rule {
            any: spec.any,
            kinds,
            pkgs: split_list(spec.pkg.as_deref()).map(Pattern::parse).collect(),
            names: split_list(spec.name.as_deref()).map(Pattern::parse).collect(),
            stdlib: spec.stdlib,
            main_module: spec.main_module,
            generic: spec.generic,
            exported: spec.exported,
            action: spec.action.unwrap_or(Action::Trap),
        })
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Whether any condition applies to `kind`. `generic` only applies to
    /// function-like declarations.
    fn has_conditions(&self, kind: DeclKind) -> bool {
        !self.kinds.is_empty()
            || !self.pkgs.is_empty()
            || !self.names.is_empty()
            || self.stdlib.is_some()
            || self.main_module.is_some()
            || (self.generic.is_some() && kind.is_func())
            || self.exported.is_some()
    }

    pub fn matches(&self, subject: &Subject<'_>) -> bool {
        if self.any {
            return true;
        }
        if !self.has_conditions(subject.kind) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.iter().any(|k| k.matches(subject.kind)) {
            return false;
        }
        if !self.pkgs.is_empty() && !self.pkgs.iter().any(|p| p.matches(subject.pkg)) {
            return false;
        }
        if !self.names.is_empty()
            && !self
                .names
                .iter()
                .any(|p| p.matches(subject.name) || p.matches(subject.identity_name))
        {
            return false;
        }
        let flag = |wanted: Option<bool>, actual: bool| wanted.is_none_or(|w| w == actual);
        if !flag(self.stdlib, subject.stdlib)
            || !flag(self.main_module, subject.main_module)
            || !flag(self.exported, subject.exported)
        {
            return false;
        }
        if subject.kind.is_func() && !flag(self.generic, subject.generic) {
            return false;
        }
        true
    }
}

fn split_list(list: Option<&str>) -> impl Iterator<Item = &str> {
    list.into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

/// Ordered rule list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        RuleSet { rules }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file: RuleFile = load_json(path, "rule file")?;
        Self::compile(file).map_err(|message| ConfigError::Invalid {
            what: "rule file",
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse a rule document from a string.
    pub fn from_json(text: &str) -> Result<Self, String> {
        let file: RuleFile = serde_json::from_str(text).map_err(|err| err.to_string())?;
        Self::compile(file)
    }

    fn compile(file: RuleFile) -> Result<Self, String> {
        let specs = match file {
            RuleFile::Wrapped { rules } | RuleFile::Bare(rules) => rules,
        };
        specs
            .iter()
            .enumerate()
            .map(|(i, spec)| Rule::compile(spec).map_err(|err| format!("rule {i}: {err}")))
            .collect::<Result<Vec<_>, _>>()
            .map(RuleSet::new)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Action of the first matching rule.
    pub fn action(&self, subject: &Subject<'_>) -> Option<Action> {
        self.rules
            .iter()
            .find(|rule| rule.matches(subject))
            .map(Rule::action)
    }
}
