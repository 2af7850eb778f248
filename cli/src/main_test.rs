use clap::CommandFactory;

use super::*;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("voluntariado").chain(args.iter().copied())).unwrap()
}

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn whoami_refresh_flag() {
    let cli = parse(&["whoami", "--refresh"]);
    assert!(matches!(cli.command, Command::Whoami { refresh: true }));
}

#[test]
fn login_takes_credentials() {
    let cli = parse(&["login", "--email", "vol@uncuyo.edu.ar", "--password", "secreto"]);
    let Command::Login(creds) = cli.command else { panic!("expected login") };
    assert_eq!(creds.email, "vol@uncuyo.edu.ar");
    assert_eq!(creds.password, "secreto");
}

#[test]
fn register_defaults_to_volunteer_and_parses_role_codes() {
    let cli = parse(&["register", "--email", "v@uncuyo.edu.ar", "--password", "secreto"]);
    assert!(matches!(cli.command, Command::Register { role: Role::Voluntario, .. }));

    let cli = parse(&["register", "--email", "d@uncuyo.edu.ar", "--password", "secreto", "--role", "DELEG"]);
    assert!(matches!(cli.command, Command::Register { role: Role::Delegado, .. }));

    let err = Cli::try_parse_from(["voluntariado", "register", "--email", "x@y.z", "--password", "p", "--role", "deleg"])
        .unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
}

#[test]
fn api_get_requires_numeric_id() {
    let cli = parse(&["api", "get", "turnos", "12"]);
    let Command::Api(ApiCommand { command: ApiSubcommand::Get { resource, id } }) = cli.command else {
        panic!("expected api get");
    };
    assert_eq!((resource.as_str(), id), ("turnos", 12));

    let err = Cli::try_parse_from(["voluntariado", "api", "get", "turnos", "abc"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
}

#[test]
fn reset_confirm_defaults_confirmation() {
    let cli = parse(&["reset-password", "confirm", "tok", "--password", "nueva123"]);
    let Command::ResetPassword(ResetPasswordCommand {
        command: ResetPasswordSubcommand::Confirm { token, confirm, .. },
    }) = cli.command
    else {
        panic!("expected reset-password confirm");
    };
    assert_eq!(token, "tok");
    assert_eq!(confirm, None);
}

#[test]
fn resource_lookup() {
    assert_eq!(lookup("facultades").unwrap().base, "/facultad/facultades/");
    assert!(matches!(lookup("boards"), Err(CliError::UnknownResource(name)) if name == "boards"));
}

#[test]
fn check_output() {
    assert_eq!(describe_check("/dashboard", "/dashboard"), "allow /dashboard");
    assert_eq!(
        describe_check("/dashboard", "/signin?redirect=%2Fdashboard"),
        "redirect /dashboard -> /signin?redirect=%2Fdashboard"
    );
}
