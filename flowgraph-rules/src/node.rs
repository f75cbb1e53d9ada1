use std::fmt;

use flowgraph_common::{PortNo, SwitchId};
use flowgraph_hsa::{
    FieldLayout, HeaderSpace, HeaderSpaceConverter, HsaError, Match, Rewrite, SetField,
    TernaryArray,
};

use crate::RuleKey;

/// A stable identifier of a rule stored in a [`RuleGraph`](crate::RuleGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(u64);

impl RuleId {
    #[inline]
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule#{}", self.0)
    }
}

/// A flow table action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Output(PortNo),
    SetField(SetField),
}

/// A flow rule as reported by the flow source, before conversion to header spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRule {
    pub switch: SwitchId,
    pub in_port: Option<PortNo>,
    pub priority: u16,
    pub predicate: Match,
    pub actions: Vec<Action>,
}

impl FlowRule {
    pub fn new(switch: SwitchId, priority: u16, predicate: Match) -> Self {
        Self { switch, in_port: None, priority, predicate, actions: Vec::new() }
    }

    pub fn in_port(mut self, port: PortNo) -> Self {
        self.in_port = Some(port);
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

/// A forwarding rule together with the header spaces it matches and emits.
///
/// `match_array` is the rule's nominal match. `really_match` is what is left of it once every
/// overlapping rule of higher priority has taken its share; the graph keeps it up to date.
/// The output spaces are the match spaces passed through the rule's rewrite, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleNode {
    switch: SwitchId,
    priority: u16,
    key: RuleKey,
    really_match: HeaderSpace,
    rewrite: Option<Rewrite>,
    output_array: TernaryArray,
    really_output: HeaderSpace,
    actions: Vec<Action>,
    out_port: Option<PortNo>,
}

impl RuleNode {
    /// Creates a rule matching `match_array` on any in-port, without actions (a dropping
    /// rule).
    pub fn new(switch: SwitchId, priority: u16, match_array: TernaryArray) -> Self {
        let really_match = HeaderSpace::from_array(match_array.clone());
        Self {
            switch,
            priority,
            output_array: match_array.clone(),
            really_output: really_match.clone(),
            really_match,
            key: RuleKey::new(None, match_array),
            rewrite: None,
            actions: Vec::new(),
            out_port: None,
        }
    }

    /// Restricts the rule to packets arriving at `port`.
    pub fn with_in_port(mut self, port: PortNo) -> Self {
        self.key = RuleKey::new(Some(port), self.key.match_array().clone());
        self
    }

    /// Appends an output action.
    pub fn with_out_port(self, port: PortNo) -> Self {
        let mut actions = self.actions.clone();
        actions.push(Action::Output(port));
        self.with_actions(actions)
    }

    /// Replaces the action list. The out-port is the first output action.
    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.out_port = actions.iter().find_map(|action| match action {
            Action::Output(port) => Some(*port),
            Action::SetField(_) => None,
        });
        self.actions = actions;
        self
    }

    /// Sets the header rewrite applied to matched packets.
    pub fn with_rewrite(mut self, rewrite: Rewrite) -> Result<Self, HsaError> {
        if rewrite.width() != self.width() {
            return Err(HsaError::WidthMismatch { expected: self.width(), found: rewrite.width() });
        }
        self.rewrite = (!rewrite.is_identity()).then_some(rewrite);
        self.refresh_output()?;
        Ok(self)
    }

    /// Converts a flow rule through `layout`. Set-field actions become the rule's rewrite.
    pub fn from_flow_rule(rule: &FlowRule, layout: &FieldLayout) -> Result<Self, HsaError> {
        let mut node = Self::new(rule.switch, rule.priority, layout.parse(&rule.predicate)?)
            .with_actions(rule.actions.clone());
        if let Some(port) = rule.in_port {
            node = node.with_in_port(port);
        }

        let set_fields: Vec<SetField> = rule
            .actions
            .iter()
            .filter_map(|action| match action {
                Action::SetField(set) => Some(set.clone()),
                Action::Output(_) => None,
            })
            .collect();
        if !set_fields.is_empty() {
            node = node.with_rewrite(layout.rewrite(&set_fields)?)?;
        }

        Ok(node)
    }

    #[inline]
    pub const fn switch(&self) -> SwitchId {
        self.switch
    }

    #[inline]
    pub const fn in_port(&self) -> Option<PortNo> {
        self.key.in_port()
    }

    #[inline]
    pub const fn priority(&self) -> u16 {
        self.priority
    }

    #[inline]
    pub const fn key(&self) -> &RuleKey {
        &self.key
    }

    #[inline]
    pub const fn match_array(&self) -> &TernaryArray {
        self.key.match_array()
    }

    #[inline]
    pub const fn really_match(&self) -> &HeaderSpace {
        &self.really_match
    }

    #[inline]
    pub const fn rewrite(&self) -> Option<&Rewrite> {
        self.rewrite.as_ref()
    }

    /// The nominal match passed through the rewrite.
    #[inline]
    pub const fn output_array(&self) -> &TernaryArray {
        &self.output_array
    }

    #[inline]
    pub const fn really_output(&self) -> &HeaderSpace {
        &self.really_output
    }

    #[inline]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    #[inline]
    pub const fn out_port(&self) -> Option<PortNo> {
        self.out_port
    }

    #[inline]
    pub const fn width(&self) -> usize {
        self.key.match_array().width()
    }

    /// Returns `true` if the rule has no output action.
    #[inline]
    pub const fn is_dropping(&self) -> bool {
        self.out_port.is_none()
    }

    /// Removes the headers of a higher priority rule's match from this rule's really matched
    /// space.
    pub(crate) fn rob(&mut self, higher: &TernaryArray) -> Result<(), HsaError> {
        self.really_match.subtract(higher.clone())?;
        self.really_match.cleanup()?;
        self.refresh_output()
    }

    /// Recomputes the really matched space as the match minus every given higher priority
    /// match.
    pub(crate) fn reset_really_match<'a>(
        &mut self,
        higher: impl IntoIterator<Item = &'a TernaryArray>,
    ) -> Result<(), HsaError> {
        let mut really_match = HeaderSpace::from_array(self.match_array().clone());
        for array in higher {
            really_match.subtract(array.clone())?;
        }
        really_match.cleanup()?;
        self.really_match = really_match;
        self.refresh_output()
    }

    fn refresh_output(&mut self) -> Result<(), HsaError> {
        match &self.rewrite {
            Some(rewrite) => {
                self.output_array = rewrite.apply(self.match_array())?;
                let mut really_output = self.really_match.clone();
                really_output.apply_rewrite(rewrite)?;
                self.really_output = really_output;
            }
            None => {
                self.output_array = self.match_array().clone();
                self.really_output = self.really_match.clone();
            }
        }
        Ok(())
    }
}

impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[prio={}", self.switch, self.priority)?;
        if let Some(port) = self.in_port() {
            write!(f, ", in={port}")?;
        }
        write!(f, ", match={}", self.match_array())?;
        match self.out_port {
            Some(port) => write!(f, ", out={port}]"),
            None => f.write_str(", drop]"),
        }
    }
}
