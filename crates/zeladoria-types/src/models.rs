use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unknown value for one of the closed vocabularies below.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "cidadao")]
    Citizen,
    #[serde(rename = "prefeitura")]
    Authority,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Citizen => "cidadao",
            Role::Authority => "prefeitura",
            Role::Admin => "admin",
        }
    }

    /// Authority accounts wait for manual activation; everyone else starts active.
    pub fn active_on_signup(self) -> bool {
        !matches!(self, Role::Authority)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cidadao" => Ok(Role::Citizen),
            "prefeitura" => Ok(Role::Authority),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueStatus {
    #[default]
    #[serde(rename = "aberto")]
    Open,
    #[serde(rename = "analise")]
    InReview,
    #[serde(rename = "resolvido")]
    Resolved,
    #[serde(rename = "arquivado")]
    Archived,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 4] = [
        IssueStatus::Open,
        IssueStatus::InReview,
        IssueStatus::Resolved,
        IssueStatus::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Open => "aberto",
            IssueStatus::InReview => "analise",
            IssueStatus::Resolved => "resolvido",
            IssueStatus::Archived => "arquivado",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "status",
                value: s.to_string(),
            })
    }
}
