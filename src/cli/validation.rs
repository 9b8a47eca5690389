use chrono::NaiveDate;

use crate::cli::args::{
    CliArgs, Command, EntryAction, EntryFilters, MachineAction, SettingsAction, TeacherAction,
};
use crate::model::{EntryStatus, MachineStatus, Role, ServiceType};
use crate::settings;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(limit) = args.limit {
        if limit == 0 {
            return Err("invalid --limit, expected positive integer".to_string());
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid --timeout, expected positive integer".to_string());
        }
    }
    match &args.command {
        Command::Teachers { action } => {
            let role = match action {
                TeacherAction::Register(form) => form.role.as_deref(),
                TeacherAction::Update { form, .. } => form.role.as_deref(),
                _ => None,
            };
            if let Some(role) = role {
                if Role::parse(role).is_none() {
                    return Err(format!(
                        "invalid --role '{role}', expected Admin, Co-Admin, or Teacher"
                    ));
                }
            }
        }
        Command::Machines { action } => {
            let form = match action {
                MachineAction::Register(form) => Some(form),
                MachineAction::Update { form, .. } => Some(form),
                _ => None,
            };
            if let Some(form) = form {
                if let Some(status) = form.status.as_deref() {
                    if MachineStatus::parse(status).is_none() {
                        return Err(format!(
                            "invalid --status '{status}', expected Active or Inactive"
                        ));
                    }
                }
                if let Some(service) = form.service_type.as_deref() {
                    if ServiceType::parse(service).is_none() {
                        return Err(format!(
                            "invalid --service-type '{service}', expected Monitor or Enroll"
                        ));
                    }
                }
            }
        }
        Command::Entries { action } => {
            let filters = match action {
                EntryAction::List { filters, .. } => filters,
                EntryAction::Summary { filters } => filters,
            };
            validate_entry_filters(filters)?;
        }
        Command::Settings { action } => {
            if let SettingsAction::Set { late_threshold } = action {
                if settings::normalize_threshold(late_threshold).is_none() {
                    return Err(format!(
                        "invalid late threshold '{late_threshold}', expected HH:MM"
                    ));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_entry_filters(filters: &EntryFilters) -> Result<(), String> {
    if let Some(date) = filters.date.as_deref() {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| format!("invalid --date '{date}', expected YYYY-MM-DD"))?;
    }
    if let Some(time) = filters.start_time.as_deref() {
        if settings::normalize_threshold(time).is_none() {
            return Err(format!("invalid --start-time '{time}', expected HH:MM"));
        }
    }
    if let Some(time) = filters.end_time.as_deref() {
        if settings::normalize_threshold(time).is_none() {
            return Err(format!("invalid --end-time '{time}', expected HH:MM"));
        }
    }
    if let Some(status) = filters.status.as_deref() {
        if EntryStatus::parse(status).is_none() {
            return Err(format!(
                "invalid --status '{status}', expected On Time, Late, Absent, or Present"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn rejects_zero_limit() {
        let args = parse(&["asphaleia", "--limit", "0", "students", "list"]);
        assert!(validate(&args).is_err());
    }

    #[test]
    fn rejects_unknown_role() {
        let args = parse(&[
            "asphaleia", "teachers", "register", "--name", "x", "--role", "principal",
        ]);
        assert!(validate(&args).unwrap_err().contains("--role"));
    }

    #[test]
    fn accepts_case_insensitive_machine_status() {
        let args = parse(&["asphaleia", "machines", "register", "--status", "inactive"]);
        assert!(validate(&args).is_ok());
    }

    #[test]
    fn rejects_malformed_entry_date() {
        let args = parse(&["asphaleia", "entries", "list", "--date", "08/05/2025"]);
        assert!(validate(&args).unwrap_err().contains("--date"));
    }

    #[test]
    fn rejects_malformed_threshold() {
        let args = parse(&["asphaleia", "settings", "set", "7:77"]);
        assert!(validate(&args).is_err());
    }

    #[test]
    fn accepts_valid_threshold() {
        let args = parse(&["asphaleia", "settings", "set", "07:30"]);
        assert!(validate(&args).is_ok());
    }
}
