use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = job_postings)]
#[diesel(belongs_to(User, foreign_key = recruiter_id))]
pub struct JobPosting {
    pub id: i64,
    pub recruiter_id: i64,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_postings)]
pub struct NewJobPosting {
    pub recruiter_id: i64,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = applications)]
#[diesel(belongs_to(JobPosting, foreign_key = job_posting_id))]
pub struct Application {
    pub id: i64,
    pub job_seeker_id: i64,
    pub job_posting_id: i64,
    pub status: String,
    pub resume_filename: String,
    pub applied_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = applications)]
pub struct NewApplication {
    pub job_seeker_id: i64,
    pub job_posting_id: i64,
    pub status: String,
    pub resume_filename: String,
    pub applied_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    JobSeeker,
    Recruiter,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::JobSeeker => "job_seeker",
            Role::Recruiter => "recruiter",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "job_seeker" => Ok(Role::JobSeeker),
            "recruiter" => Ok(Role::Recruiter),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Lifecycle of a job posting. Only `Open` postings accept applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingStatus {
    Open,
    Closed,
    Archived,
}

impl PostingStatus {
    pub const ALL: [PostingStatus; 3] = [
        PostingStatus::Open,
        PostingStatus::Closed,
        PostingStatus::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PostingStatus::Open => "Open",
            PostingStatus::Closed => "Closed",
            PostingStatus::Archived => "Archived",
        }
    }
}

impl FromStr for PostingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| {
                format!(
                    "invalid job posting status '{value}'. Allowed: {}",
                    join_labels(Self::ALL.iter().map(|status| status.as_str()))
                )
            })
    }
}

impl fmt::Display for PostingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    New,
    UnderReview,
    Shortlisted,
    Rejected,
    Hired,
    InterviewScheduled,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::New,
        ApplicationStatus::UnderReview,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::Rejected,
        ApplicationStatus::Hired,
        ApplicationStatus::InterviewScheduled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::New => "New",
            ApplicationStatus::UnderReview => "UnderReview",
            ApplicationStatus::Shortlisted => "Shortlisted",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Hired => "Hired",
            ApplicationStatus::InterviewScheduled => "InterviewScheduled",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| {
                format!(
                    "invalid application status '{value}'. Allowed: {}",
                    join_labels(Self::ALL.iter().map(|status| status.as_str()))
                )
            })
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn join_labels<'a>(labels: impl Iterator<Item = &'a str>) -> String {
    labels.collect::<Vec<_>>().join(", ")
}
