//! Organization housekeeping around a hackathon: archiving, invitations and
//! per-team repositories and teams. Each operation keeps going past
//! individual failures and reports how many items it got through.

use log::*;

use crate::error::{BatchError, ConfigError};
use crate::github::OrgAdmin;

pub mod roster;

use roster::{sanitize_team_name, TeamRoster};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AdminSummary {
  pub succeeded: u32,
  pub failed: u32,
  pub unchanged: u32,
}

async fn require_org(admin: &dyn OrgAdmin, org: &str) -> Result<(), BatchError> {
  if admin.organization_exists(org).await? {
    Ok(())
  } else {
    Err(ConfigError::OrganizationNotFound(org.to_string()).into())
  }
}

/// Archives every repository in the organization that is not archived yet.
pub async fn archive_org_repos(admin: &dyn OrgAdmin, org: &str) -> Result<AdminSummary, BatchError> {
  require_org(admin, org).await?;
  let mut summary = AdminSummary::default();

  for repo in admin.list_org_repositories(org).await? {
    if repo.archived {
      info!("Repository already archived: {}", repo.id.name);
      summary.unchanged += 1;
      continue;
    }

    info!("Archiving repository: {}", repo.id.name);
    match admin.archive_repository(&repo.id).await {
      Ok(()) => {
        info!("Successfully archived: {}", repo.id.name);
        summary.succeeded += 1;
      }
      Err(e) => {
        warn!("Failed to archive repository {}: {}", repo.id.name, e);
        summary.failed += 1;
      }
    }
  }

  Ok(summary)
}

/// Sends an organization invitation to each address.
pub async fn invite_members(
  admin: &dyn OrgAdmin,
  org: &str,
  emails: &[String],
) -> Result<AdminSummary, BatchError> {
  require_org(admin, org).await?;
  let mut summary = AdminSummary::default();

  for email in emails {
    match admin.invite_by_email(org, email).await {
      Ok(()) => {
        info!("Invitation sent to {}", email);
        summary.succeeded += 1;
      }
      Err(e) => {
        warn!("Failed to invite {}: {}", email, e);
        summary.failed += 1;
      }
    }
  }

  Ok(summary)
}

/// Creates one public repository per team from the template repository.
pub async fn create_team_repos(
  admin: &dyn OrgAdmin,
  org: &str,
  template: &str,
  teams: &[String],
) -> Result<AdminSummary, BatchError> {
  require_org(admin, org).await?;
  let mut summary = AdminSummary::default();

  for team in teams {
    let repo_name = sanitize_team_name(team);
    match admin.create_from_template(org, template, &repo_name).await {
      Ok(()) => {
        info!("Repository '{}' created for team '{}'", repo_name, team);
        summary.succeeded += 1;
      }
      Err(e) => {
        warn!("Failed to create repository for team '{}': {}", team, e);
        summary.failed += 1;
      }
    }
  }

  Ok(summary)
}

/// Creates a closed team per roster entry and adds its members. Counts are
/// per membership; a team that cannot be created counts each of its members
/// as failed.
pub async fn create_teams(
  admin: &dyn OrgAdmin,
  org: &str,
  teams: &[TeamRoster],
) -> Result<AdminSummary, BatchError> {
  require_org(admin, org).await?;
  let mut summary = AdminSummary::default();

  for roster in teams {
    let team_name = sanitize_team_name(&roster.team);
    let slug = match admin.create_team(org, &team_name).await {
      Ok(slug) => {
        info!("Team '{}' created for team '{}'", team_name, roster.team);
        slug
      }
      Err(e) => {
        warn!("Failed to create team '{}': {}", roster.team, e);
        summary.failed += roster.emails.len() as u32;
        continue;
      }
    };

    for email in &roster.emails {
      let added = match admin.find_user_by_email(email).await {
        Ok(login) => admin.add_team_member(org, &slug, &login).await,
        Err(e) => Err(e),
      };

      match added {
        Ok(()) => {
          info!("Added {} to team '{}'", email, team_name);
          summary.succeeded += 1;
        }
        Err(e) => {
          warn!("Failed to add {} to team '{}': {}", email, team_name, e);
          summary.failed += 1;
        }
      }
    }
  }

  Ok(summary)
}
