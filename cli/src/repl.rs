//! Command loop. Each line is one user action dispatched to the controller.

use std::io::{BufRead, Write};

use medtrack_core::{Controller, LoginForm, MedicineForm, Page, SignupForm, Transport};

use crate::terminal::TerminalView;

pub type App<T, R, W> = Controller<T, TerminalView<R, W>>;

const HELP: &str = "\
commands:
  login            log in with username and password
  signup           create an account
  logout           end the session
  dashboard, list  show your medicines
  add              add a medicine
  edit <id>        edit a medicine (empty input keeps the current value)
  delete <id>      delete a medicine
  save             fill in the open medicine form again
  home             go to the landing page
  help             show this text
  quit, exit       leave";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Login,
    Signup,
    Logout,
    Dashboard,
    Add,
    Edit(i64),
    Delete(i64),
    Save,
    Home,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if words.next().is_some() {
            return Err(format!("too many arguments for `{verb}`"));
        }

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("login", None) => Self::Login,
            ("signup", None) => Self::Signup,
            ("logout", None) => Self::Logout,
            ("dashboard" | "list", None) => Self::Dashboard,
            ("add", None) => Self::Add,
            ("edit", Some(id)) => Self::Edit(parse_id(id)?),
            ("delete", Some(id)) => Self::Delete(parse_id(id)?),
            ("save", None) => Self::Save,
            ("home", None) => Self::Home,
            ("help", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            ("edit" | "delete", None) => return Err(format!("usage: {verb} <id>")),
            (_, Some(_)) if is_known(verb) => return Err(format!("`{verb}` takes no arguments")),
            _ => return Err(format!("unknown command `{verb}`, type `help`")),
        };
        Ok(Some(command))
    }
}

fn is_known(verb: &str) -> bool {
    matches!(
        verb.to_ascii_lowercase().as_str(),
        "login" | "signup" | "logout" | "dashboard" | "list" | "add" | "save" | "home" | "help" | "quit" | "exit"
    )
}

fn parse_id(raw: &str) -> Result<i64, String> {
    raw.parse().map_err(|_| format!("`{raw}` is not a medicine id"))
}

/// Read commands until `quit` or end of input.
pub fn run<T, R, W>(app: &mut App<T, R, W>) -> std::io::Result<()>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    loop {
        let Some(line) = app.view_mut().prompt("medtrack> ")? else {
            return Ok(());
        };
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                app.view_mut().line(message);
                continue;
            }
        };
        if command == Command::Quit {
            return Ok(());
        }
        if !dispatch(app, command)? {
            return Ok(());
        }
    }
}

/// Run one command. Returns `false` when input ended inside a form.
fn dispatch<T, R, W>(app: &mut App<T, R, W>, command: Command) -> std::io::Result<bool>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    // Flow failures are already reported through the view.
    let outcome = match command {
        Command::Login => {
            app.show_login();
            let Some(form) = login_form(app.view_mut())? else {
                return Ok(false);
            };
            app.submit_login(&form)
        }
        Command::Signup => {
            app.show_signup();
            let Some(form) = signup_form(app.view_mut())? else {
                return Ok(false);
            };
            app.submit_signup(&form)
        }
        Command::Logout => app.logout(),
        Command::Dashboard => app.show_dashboard(),
        Command::Add => {
            app.begin_add();
            return fill_and_save(app);
        }
        Command::Edit(id) => match app.begin_edit(id) {
            Ok(()) => return fill_and_save(app),
            Err(err) => Err(err),
        },
        Command::Delete(id) => app.delete_medicine(id),
        Command::Save => {
            if app.state().page() != Page::MedicineForm {
                app.view_mut().line("No medicine form is open. Use `add` or `edit <id>`.");
                return Ok(true);
            }
            return fill_and_save(app);
        }
        Command::Home => {
            app.show_home();
            Ok(())
        }
        Command::Help => {
            app.view_mut().line(HELP);
            Ok(())
        }
        Command::Quit => Ok(()),
    };
    if let Err(err) = outcome {
        tracing::debug!(?command, error = %err, "command did not complete");
    }
    Ok(true)
}

fn fill_and_save<T, R, W>(app: &mut App<T, R, W>) -> std::io::Result<bool>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    let current = app.state().form_values();
    let Some(form) = medicine_form(app.view_mut(), &current)? else {
        return Ok(false);
    };
    if let Err(err) = app.save_medicine(&form) {
        tracing::debug!(error = %err, "medicine not saved");
        app.view_mut().line("Type `save` to try again.");
    }
    Ok(true)
}

fn login_form<R: BufRead, W: Write>(view: &mut TerminalView<R, W>) -> std::io::Result<Option<LoginForm>> {
    let Some(username) = view.prompt("Username: ")? else {
        return Ok(None);
    };
    let Some(password) = view.prompt_secret("Password: ")? else {
        return Ok(None);
    };
    Ok(Some(LoginForm { username, password }))
}

fn signup_form<R: BufRead, W: Write>(view: &mut TerminalView<R, W>) -> std::io::Result<Option<SignupForm>> {
    let Some(username) = view.prompt("Username: ")? else {
        return Ok(None);
    };
    let Some(email) = view.prompt("Email: ")? else {
        return Ok(None);
    };
    let Some(password) = view.prompt_secret("Password: ")? else {
        return Ok(None);
    };
    let Some(confirm_password) = view.prompt_secret("Confirm password: ")? else {
        return Ok(None);
    };
    Ok(Some(SignupForm {
        username,
        email,
        password,
        confirm_password,
    }))
}

/// Prompt for each field, showing the current value. Empty input keeps it.
fn medicine_form<R: BufRead, W: Write>(
    view: &mut TerminalView<R, W>,
    current: &MedicineForm,
) -> std::io::Result<Option<MedicineForm>> {
    let mut field = |label: &str, value: &str| -> std::io::Result<Option<String>> {
        let label = if value.is_empty() {
            format!("{label}: ")
        } else {
            format!("{label} [{value}]: ")
        };
        Ok(view.prompt(&label)?.map(|input| {
            if input.trim().is_empty() {
                value.to_string()
            } else {
                input
            }
        }))
    };

    let Some(name) = field("Name", &current.name)? else {
        return Ok(None);
    };
    let Some(dosage) = field("Dosage", &current.dosage)? else {
        return Ok(None);
    };
    let Some(frequency) = field("Frequency", &current.frequency)? else {
        return Ok(None);
    };
    Ok(Some(MedicineForm {
        name,
        dosage,
        frequency,
    }))
}
