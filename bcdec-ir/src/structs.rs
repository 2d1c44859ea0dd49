//! Control structures recovered by the structural analysis.

use crate::cfg::{BbId, CaseValue, EdgeId};

/// Branch a group of members belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKey {
    /// Loop body and sync body.
    Body,
    /// Cond branch taken when the condition has this value.
    Branch(bool),
    /// Switch case entered through this case edge.
    Case(EdgeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CondKind {
    If,
    IfNot,
    IfElse,
    IfNotElse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    While,
    WhileNot,
    DoWhile,
    DoWhileNot,
    Endless,
}

impl LoopKind {
    /// Condition checked at the head.
    pub fn is_pre(self) -> bool {
        matches!(self, LoopKind::While | LoopKind::WhileNot)
    }

    /// Condition checked at the last block.
    pub fn is_post(self) -> bool {
        matches!(self, LoopKind::DoWhile | LoopKind::DoWhileNot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchKind {
    NoDefault,
    WithDefault,
}

/// One case arm of a switch in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub edge: EdgeId,
    pub values: Vec<CaseValue>,
    /// Control falls through from this case into the next one.
    pub fall_through: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StructKind {
    Cond(CondKind),
    Loop {
        kind: LoopKind,
        /// Latest back-edge source.
        last: Option<BbId>,
    },
    Switch {
        kind: SwitchKind,
        cases: Vec<SwitchCase>,
    },
    Sync,
}

/// A region of blocks with a head, members per branch and an optional follow.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    pub head: BbId,
    pub follow: Option<BbId>,
    /// Index of the enclosing struct in `Cfg::structs`.
    pub parent: Option<usize>,
    pub members: Vec<(MemberKey, Vec<BbId>)>,
    pub kind: StructKind,
}

impl Struct {
    pub fn new(head: BbId, kind: StructKind) -> Self {
        Struct {
            head,
            follow: None,
            parent: None,
            members: Vec::new(),
            kind,
        }
    }

    pub fn is_head(&self, bb: BbId) -> bool {
        self.head == bb
    }

    /// The head or a member of any branch.
    pub fn is_member(&self, bb: BbId) -> bool {
        self.head == bb || self.members.iter().any(|(_, bbs)| bbs.contains(&bb))
    }

    pub fn is_member_of(&self, key: &MemberKey, bb: BbId) -> bool {
        self.members_of(key).contains(&bb)
    }

    pub fn members_of(&self, key: &MemberKey) -> &[BbId] {
        self.members
            .iter()
            .find(|(k, _)| k == key)
            .map_or(&[], |(_, bbs)| bbs.as_slice())
    }

    /// Member list of `key`, created on first use.
    pub fn members_mut(&mut self, key: MemberKey) -> &mut Vec<BbId> {
        let pos = match self.members.iter().position(|(k, _)| *k == key) {
            Some(pos) => pos,
            None => {
                self.members.push((key, Vec::new()));
                self.members.len() - 1
            }
        };
        &mut self.members[pos].1
    }

    pub fn add_member(&mut self, key: MemberKey, bb: BbId) {
        let members = self.members_mut(key);
        if !members.contains(&bb) {
            members.push(bb);
        }
    }

    pub fn add_members(&mut self, key: MemberKey, bbs: impl IntoIterator<Item = BbId>) {
        for bb in bbs {
            self.add_member(key.clone(), bb);
        }
    }

    /// All members, head excluded, without duplicates.
    pub fn all_members(&self) -> Vec<BbId> {
        let mut out = Vec::new();
        for (_, bbs) in &self.members {
            for &bb in bbs {
                if !out.contains(&bb) {
                    out.push(bb);
                }
            }
        }
        out
    }

    pub fn loop_kind(&self) -> Option<LoopKind> {
        match self.kind {
            StructKind::Loop { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn loop_last(&self) -> Option<BbId> {
        match self.kind {
            StructKind::Loop { last, .. } => last,
            _ => None,
        }
    }

    pub fn cond_kind(&self) -> Option<CondKind> {
        match self.kind {
            StructKind::Cond(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self.kind, StructKind::Loop { .. })
    }

    pub fn is_sync(&self) -> bool {
        matches!(self.kind, StructKind::Sync)
    }

    /// Short tag for listings.
    pub fn label(&self) -> String {
        match &self.kind {
            StructKind::Cond(kind) => format!("cond {kind:?}"),
            StructKind::Loop { kind, .. } => format!("loop {kind:?}"),
            StructKind::Switch { kind, .. } => format!("switch {kind:?}"),
            StructKind::Sync => "sync".to_string(),
        }
    }
}
