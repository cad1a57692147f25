use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use hackathon_eval::admin::{self, roster, AdminSummary};
use hackathon_eval::config::{Credentials, EvalConfig, FetchStrategy, Timeouts};
use hackathon_eval::error::BatchError;
use hackathon_eval::fetch::RepositoryFetcher;
use hackathon_eval::github::{octocrab_handle, GithubHost};
use hackathon_eval::orchestrator::Orchestrator;
use hackathon_eval::repo_scoring::checks::{DirectoryRequirement, FolderLayout};
use hackathon_eval::repo_scoring::commit_cutoff::CutoffPolicy;
use hackathon_eval::repo_scoring::tooling::{LintSettings, TestSettings, ToolCommand};
use hackathon_eval::repo_scoring::CheckSet;

use log::*;

use simplelog::*;

#[derive(Parser, Debug)]
#[command(author, version, arg_required_else_help(true))]
struct Opts {
  /// Would you like to enable debug information?
  #[arg(short = 'd', long, default_value_t = false, global = true)]
  debug: bool,

  /// Seconds allowed for each GitHub API call or archive download.
  #[arg(long, default_value_t = 60, global = true)]
  network_timeout: u64,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Evaluate every repository in an organization against the rubric.
  Eval(EvalOpts),

  /// Archive every repository in the given organizations.
  Archive {
    /// Organizations to archive.
    #[arg(short = 'o', long = "org", required = true)]
    orgs: Vec<String>,
  },

  /// Invite everyone listed in a CSV with an `email` column.
  Invite {
    #[arg(short = 'o', long)]
    org: String,

    #[arg(short = 'r', long)]
    roster: PathBuf,
  },

  /// Create a repository per team (CSV `team` column) from a template.
  CreateRepos {
    #[arg(short = 'o', long)]
    org: String,

    #[arg(short = 'r', long)]
    roster: PathBuf,

    /// Name of the template repository inside the organization.
    #[arg(short = 't', long, default_value = "hackathon-template")]
    template: String,
  },

  /// Create a team per CSV `team` and add each `email` to it.
  CreateTeams {
    #[arg(short = 'o', long)]
    org: String,

    #[arg(short = 'r', long)]
    roster: PathBuf,
  },
}

#[derive(Args, Debug)]
struct EvalOpts {
  /// What is the name of the GitHub organization?
  #[arg(short = 'o', long)]
  org: String,

  /// Commits after this RFC 3339 instant fail the cutoff check, e.g.
  /// 2024-10-19T09:00:00+05:30.
  #[arg(short = 'c', long, value_parser = CutoffPolicy::parse)]
  cutoff: CutoffPolicy,

  /// Would you like to include archived repositories?
  #[arg(short = 'a', long, default_value_t = false)]
  archived: bool,

  /// Would you like to include forks?
  #[arg(short = 'f', long, default_value_t = false)]
  forks: bool,

  /// Only evaluate these repositories.
  #[arg(long = "repo")]
  repos: Vec<String>,

  /// Where working trees are placed while being evaluated.
  #[arg(short = 'w', long, default_value = "repo/target")]
  work_dir: PathBuf,

  #[arg(short = 's', long, value_enum, default_value_t = FetchStrategy::Clone)]
  strategy: FetchStrategy,

  /// Required directory layout, as DIR or DIR=SUB1,SUB2.
  #[arg(long = "layout", default_values_t = [String::from("artifacts=demo"), String::from("code")])]
  layout: Vec<String>,

  #[arg(long = "require-file", default_values_t = [String::from("README.md")])]
  required_files: Vec<String>,

  /// Directory that must exist, relative to the repository root.
  #[arg(long = "require-dir")]
  required_dirs: Vec<String>,

  #[arg(long = "secret-marker", default_values_t = [String::from("SECRET_KEY")])]
  secret_markers: Vec<String>,

  #[arg(long, default_value = ".flake8")]
  lint_config: String,

  #[arg(long, default_value = "flake8")]
  lint_command: ToolCommand,

  #[arg(long, default_value = "tests")]
  test_dir: String,

  #[arg(long, default_value = "pytest")]
  test_command: ToolCommand,

  /// Seconds allowed for each clone, lint or test run.
  #[arg(long, default_value_t = 600)]
  process_timeout: u64,

  #[arg(long, default_value_t = false)]
  skip_lint: bool,

  #[arg(long, default_value_t = false)]
  skip_tests: bool,

  #[arg(long, default_value_t = false)]
  skip_secrets: bool,

  /// Skip the commit count and cutoff checks.
  #[arg(long, default_value_t = false)]
  skip_commits: bool,
}

impl EvalOpts {
  fn into_config(self, network_timeout: Duration) -> Result<EvalConfig, BatchError> {
    let layout = self
      .layout
      .iter()
      .map(|l| l.parse::<DirectoryRequirement>())
      .collect::<Result<Vec<_>, _>>()?;

    let mut checks = CheckSet::default();
    checks.set(CheckSet::LINT, !self.skip_lint);
    checks.set(CheckSet::TESTS, !self.skip_tests);
    checks.set(CheckSet::SECRETS, !self.skip_secrets);
    checks.set(CheckSet::COMMITS, !self.skip_commits);

    let mut config = EvalConfig::new(self.org, self.cutoff);
    config.work_dir = self.work_dir;
    config.strategy = self.strategy;
    config.include_archived = self.archived;
    config.include_forks = self.forks;
    config.only = self.repos;
    config.layout = FolderLayout(layout);
    config.required_files = self.required_files;
    config.required_dirs = self.required_dirs;
    config.secret_markers = self.secret_markers;
    config.lint = LintSettings {
      config_file: self.lint_config,
      command: self.lint_command,
    };
    config.tests = TestSettings {
      dir: self.test_dir,
      command: self.test_command,
    };
    config.checks = checks;
    config.timeouts = Timeouts {
      network: network_timeout,
      process: Duration::from_secs(self.process_timeout),
    };

    Ok(config)
  }
}

fn log_summary(what: &str, summary: &AdminSummary) {
  info!(
    "{}: {} succeeded, {} failed, {} unchanged",
    what, summary.succeeded, summary.failed, summary.unchanged
  );
}

async fn run(opts: Opts) -> Result<(), Box<dyn std::error::Error>> {
  // Fail before touching the network if there is no token.
  let credentials = Credentials::from_env()?;
  let network_timeout = Duration::from_secs(opts.network_timeout);
  let host = GithubHost::new(octocrab_handle(&credentials)?, network_timeout);

  match opts.command {
    Command::Eval(eval_opts) => {
      let config = eval_opts.into_config(network_timeout)?;
      let fetcher = RepositoryFetcher::new(
        config.strategy,
        config.work_dir.clone(),
        credentials,
        config.timeouts,
      )?;

      let orchestrator = Orchestrator::new(&config, &host, &fetcher);
      let repos = orchestrator.discover().await?;
      let mut stdout = std::io::stdout().lock();
      orchestrator.run(&repos, &mut stdout).await;
    }
    Command::Archive { orgs } => {
      for org in orgs {
        info!("processing {}", org);
        match admin::archive_org_repos(&host, &org).await {
          Ok(summary) => log_summary("Archive", &summary),
          Err(e) => error!("An error occurred archiving {}: {}", org, e),
        }
      }
    }
    Command::Invite { org, roster } => {
      let emails = roster::read_emails(&roster)?;
      let summary = admin::invite_members(&host, &org, &emails).await?;
      log_summary("Invite", &summary);
    }
    Command::CreateRepos {
      org,
      roster,
      template,
    } => {
      let teams = roster::read_teams(&roster)?;
      let summary = admin::create_team_repos(&host, &org, &template, &teams).await?;
      log_summary("Create repositories", &summary);
    }
    Command::CreateTeams { org, roster } => {
      let teams = roster::read_team_members(&roster)?;
      let summary = admin::create_teams(&host, &org, &teams).await?;
      log_summary("Create teams", &summary);
    }
  }

  Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
  let opts = Opts::parse();

  let log_level = if opts.debug {
    LevelFilter::Debug
  } else {
    LevelFilter::Info
  };

  if let Err(e) = TermLogger::init(
    log_level,
    Config::default(),
    TerminalMode::Mixed,
    ColorChoice::Auto,
  ) {
    eprintln!("Failed to initialize logger: {:?}", e);
    return ExitCode::FAILURE;
  }

  debug!("DEBUG ENABLED");

  match run(opts).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{}", e);
      ExitCode::FAILURE
    }
  }
}
