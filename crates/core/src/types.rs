/// Identifier of a tag, plot block or plot block condition. All three share
/// one namespace within a fandom.
pub type ElementId = String;

/// Identifier of a tag class.
pub type TagClassId = String;

/// Identifier of a fandom.
pub type FandomId = String;

/// Identifier of a condition node inside a rule definition.
pub type ConditionId = String;

/// Identifier of an administrator-authored validation rule.
pub type RuleId = String;
