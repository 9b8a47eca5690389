use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "asphaleia",
    version,
    about = "terminal management console for the Asphaleia attendance system",
    long_about = "Asphaleia console manages the students, teachers, machines and attendance entries of an Asphaleia deployment from the terminal.\n\nExamples:\n  asphaleia students list --query reyes\n  asphaleia students register --name \"Ana Reyes\" --email ana@school.ph --grade 7 --section 7-A --capture\n  asphaleia entries list --date 2025-08-05 --status Late\n  asphaleia settings set 07:30\n\nTip: Use --config to persist connection settings and keep invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Connection",
        help = "Path to config file (defaults to ~/.asphaleia/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'b',
        long = "base-url",
        value_name = "URL",
        help_heading = "Connection",
        help = "API base URL (overrides the config file)."
    )]
    pub base_url: Option<String>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "Connection",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "retries",
        value_name = "N",
        help_heading = "Connection",
        help = "List fetch retries on timeout."
    )]
    pub retries: Option<u32>,

    #[arg(
        short = 'x',
        long = "proxy",
        value_name = "URL",
        help_heading = "Connection",
        help = "Route requests through an HTTP proxy."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'l',
        long = "limit",
        value_name = "N",
        help_heading = "Lists",
        help = "Rows per page (default 10)."
    )]
    pub limit: Option<u32>,

    #[arg(
        short = 'y',
        long = "yes",
        help_heading = "Output",
        help = "Skip delete confirmation prompts."
    )]
    pub assume_yes: bool,

    #[arg(
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage student records
    Students {
        #[command(subcommand)]
        action: StudentAction,
    },
    /// Manage teacher records
    Teachers {
        #[command(subcommand)]
        action: TeacherAction,
    },
    /// Manage attendance machines
    Machines {
        #[command(subcommand)]
        action: MachineAction,
    },
    /// Browse attendance entries (read-only)
    Entries {
        #[command(subcommand)]
        action: EntryAction,
    },
    /// Read or change the late threshold
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Change the admin account password
    ChangePassword(ChangePasswordOpts),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListOpts {
    #[arg(short = 'p', long = "page", value_name = "N", help = "Page to fetch (default 1).")]
    pub page: Option<u32>,

    #[arg(
        short = 'q',
        long = "query",
        value_name = "TEXT",
        help = "Free-text search over the list."
    )]
    pub query: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StudentForm {
    #[arg(long = "name", value_name = "NAME")]
    pub name: Option<String>,

    #[arg(long = "email", value_name = "EMAIL")]
    pub email: Option<String>,

    #[arg(long = "grade", value_name = "GRADE", help = "Grade level id.")]
    pub grade: Option<String>,

    #[arg(
        long = "section",
        value_name = "SECTION",
        help = "Section id; must belong to the selected grade."
    )]
    pub section: Option<String>,

    #[arg(long = "rfid", value_name = "TAG")]
    pub rfid: Option<String>,

    #[arg(long = "fingerprint-id", value_name = "ID")]
    pub fingerprint_id: Option<String>,

    #[arg(
        long = "capture",
        help = "Poll the enrollment device for RFID and fingerprint (10s window)."
    )]
    pub capture: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum StudentAction {
    /// List students, one page at a time
    List(ListOpts),
    /// Register a new student
    Register(StudentForm),
    /// Edit an existing student
    Update {
        #[arg(value_name = "ID")]
        id: i64,

        #[command(flatten)]
        list: ListOpts,

        #[command(flatten)]
        form: StudentForm,
    },
    /// Delete one student
    Delete {
        #[arg(value_name = "ID")]
        id: i64,

        #[command(flatten)]
        list: ListOpts,
    },
    /// Delete several students in one call
    BulkDelete {
        #[arg(value_name = "ID", required = true, num_args = 1..)]
        ids: Vec<i64>,

        #[command(flatten)]
        list: ListOpts,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct TeacherForm {
    #[arg(long = "name", value_name = "NAME")]
    pub name: Option<String>,

    #[arg(long = "email", value_name = "EMAIL")]
    pub email: Option<String>,

    #[arg(
        long = "role",
        value_name = "ROLE",
        help = "One of: Admin, Co-Admin, Teacher."
    )]
    pub role: Option<String>,

    #[arg(long = "rfid", value_name = "TAG")]
    pub rfid: Option<String>,

    #[arg(long = "fingerprint-id", value_name = "ID")]
    pub fingerprint_id: Option<String>,

    #[arg(
        long = "capture",
        help = "Poll the enrollment device for RFID and fingerprint (10s window)."
    )]
    pub capture: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TeacherAction {
    /// List teachers, one page at a time
    List(ListOpts),
    /// Register a new teacher
    Register(TeacherForm),
    /// Edit an existing teacher
    Update {
        #[arg(value_name = "ID")]
        id: i64,

        #[command(flatten)]
        list: ListOpts,

        #[command(flatten)]
        form: TeacherForm,
    },
    /// Delete one teacher
    Delete {
        #[arg(value_name = "ID")]
        id: i64,

        #[command(flatten)]
        list: ListOpts,
    },
    /// Delete several teachers in one call
    BulkDelete {
        #[arg(value_name = "ID", required = true, num_args = 1..)]
        ids: Vec<i64>,

        #[command(flatten)]
        list: ListOpts,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct MachineForm {
    #[arg(long = "machine-id", value_name = "N", help = "Numeric machine id.")]
    pub machine_id: Option<i64>,

    #[arg(long = "name", value_name = "NAME")]
    pub name: Option<String>,

    #[arg(long = "location", value_name = "LOCATION")]
    pub location: Option<String>,

    #[arg(long = "status", value_name = "STATUS", help = "Active or Inactive.")]
    pub status: Option<String>,

    #[arg(
        long = "service-type",
        value_name = "TYPE",
        help = "Monitor or Enroll."
    )]
    pub service_type: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum MachineAction {
    /// List machines, one page at a time
    List(ListOpts),
    /// Register a new machine
    Register(MachineForm),
    /// Edit an existing machine
    Update {
        #[arg(value_name = "ID")]
        id: i64,

        #[command(flatten)]
        list: ListOpts,

        #[command(flatten)]
        form: MachineForm,
    },
    /// Delete one machine
    Delete {
        #[arg(value_name = "ID")]
        id: i64,

        #[command(flatten)]
        list: ListOpts,
    },
    /// Delete several machines in one call
    BulkDelete {
        #[arg(value_name = "ID", required = true, num_args = 1..)]
        ids: Vec<i64>,

        #[command(flatten)]
        list: ListOpts,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct EntryFilters {
    #[arg(long = "date", value_name = "YYYY-MM-DD")]
    pub date: Option<String>,

    #[arg(long = "start-time", value_name = "HH:MM")]
    pub start_time: Option<String>,

    #[arg(long = "end-time", value_name = "HH:MM")]
    pub end_time: Option<String>,

    #[arg(
        long = "status",
        value_name = "STATUS",
        help = "One of: On Time, Late, Absent, Present."
    )]
    pub status: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EntryAction {
    /// List attendance entries, one page at a time
    List {
        #[command(flatten)]
        list: ListOpts,

        #[command(flatten)]
        filters: EntryFilters,
    },
    /// Per-status entry counts for the selected filters
    Summary {
        #[command(flatten)]
        filters: EntryFilters,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsAction {
    /// Print the current settings
    Get,
    /// Update the late threshold
    Set {
        #[arg(value_name = "HH:MM")]
        late_threshold: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ChangePasswordOpts {
    #[arg(
        long = "current-username",
        value_name = "NAME",
        help = "Account being changed (falls back to the config file)."
    )]
    pub current_username: Option<String>,

    #[arg(long = "username", value_name = "NAME", help = "New username.")]
    pub username: String,

    #[arg(long = "current-password", value_name = "PASSWORD")]
    pub current_password: String,

    #[arg(long = "new-password", value_name = "PASSWORD")]
    pub new_password: String,
}
