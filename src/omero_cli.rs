//! Queries through the OMERO command line client. `omero login` opens or joins the session and
//! `omero hql` runs each projection, printing CSV that is parsed back into cells.

use std::process::{Command, Stdio};

use crate::credentials::ConnectionParams;
use crate::error::{Error, Result};
use crate::gateway::ALL_GROUPS;
use crate::rtypes::Parameters;
use crate::table::parse_records;

///The `omero` program
#[derive(Debug, Clone)]
pub struct OmeroCli {
    pub program: String,
}

impl Default for OmeroCli {
    fn default() -> Self {
        OmeroCli {
            program: "omero".to_string(),
        }
    }
}

///Arguments of `omero login`. A session uuid joins that session, otherwise a new one is created
///with the username and password.
pub fn login_args(params: &ConnectionParams) -> Vec<String> {
    let mut args = vec![
        "login".to_string(),
        "-s".to_string(),
        params.host.clone(),
        "-p".to_string(),
        params.port.to_string(),
    ];
    match &params.session_uuid {
        Some(uuid) => args.extend(["-k".to_string(), uuid.clone()]),
        None => {
            args.extend(["-u".to_string(), params.username.clone().unwrap_or_default()]);
            args.extend(["-w".to_string(), params.password.clone().unwrap_or_default()]);
        }
    }
    args
}

///Arguments of `omero hql` for one projection, every row, CSV output, no prompting
pub fn hql_args(query: &str, params: &Parameters, group: i64) -> Result<Vec<String>> {
    let mut args = vec![
        "hql".to_string(),
        "-q".to_string(),
        "--style".to_string(),
        "csv".to_string(),
        "--limit=-1".to_string(),
    ];
    if group == ALL_GROUPS {
        args.push("--all".to_string());
    }
    args.push(bind_literals(query, params)?);
    Ok(args)
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

///Replace every `:name` placeholder outside quoted text with its parameter's literal. The CLI
///takes no parameters, and only integers and formatted timestamps are ever substituted.
pub fn bind_literals(query: &str, params: &Parameters) -> Result<String> {
    let mut out = String::with_capacity(query.len());
    let mut quoted = false;
    let mut chars = query.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            quoted = !quoted;
        }
        if c != ':' || quoted {
            out.push(c);
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while let Some(&(j, n)) = chars.peek() {
            if !is_ident(n) {
                break;
            }
            end = j + n.len_utf8();
            chars.next();
        }
        let name = &query[start..end];
        if name.is_empty() {
            out.push(c);
            continue;
        }
        let value = params
            .get(name)
            .ok_or_else(|| Error::UnboundParameter(name.to_string()))?;
        out.push_str(&value.literal()?);
    }
    Ok(out)
}

//the sql style ends with a row count, the csv style does not; accept either
fn is_row_count(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('(') && (line.ends_with(" row)") || line.ends_with(" rows)"))
}

///One CLI cell as JSON: empty and `None` are null, integers are numbers, the rest is text
fn cell(text: Option<String>) -> serde_json::Value {
    match text {
        None => serde_json::Value::Null,
        Some(t) if t.is_empty() || t == "None" => serde_json::Value::Null,
        Some(t) => match t.parse::<i64>() {
            Ok(i) => i.into(),
            Err(_) => t.into(),
        },
    }
}

///Rows of `omero hql --style csv` output. The first line is the `#,Col1,...` header and the
///first column is the row index; both are dropped.
pub fn parse_hql_output(stdout: &str) -> Result<Vec<Vec<serde_json::Value>>> {
    let mut lines: Vec<&str> = stdout.lines().skip(1).collect();
    while lines
        .last()
        .is_some_and(|l| l.trim().is_empty() || is_row_count(l))
    {
        lines.pop();
    }
    let records = parse_records(&lines.join("\n"))?;
    Ok(records
        .into_iter()
        .map(|record| record.into_iter().skip(1).map(cell).collect())
        .collect())
}

impl OmeroCli {
    fn run(&self, args: &[String]) -> Result<String> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::CliMissing {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(Error::CliFailed {
                command: format!("{} {}", self.program, args.first().map_or("", String::as_str)),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    ///Open or join the session. A refused login is an authentication error.
    pub fn login(&self, params: &ConnectionParams) -> Result<()> {
        match self.run(&login_args(params)) {
            Ok(_) => Ok(()),
            Err(Error::CliFailed { stderr, .. }) => {
                log::debug!("login refused: {stderr}");
                Err(Error::Authentication)
            }
            Err(e) => Err(e),
        }
    }

    ///Run one projection in the current session
    pub fn projection(
        &self,
        query: &str,
        params: &Parameters,
        group: i64,
    ) -> Result<Vec<Vec<serde_json::Value>>> {
        let stdout = self.run(&hql_args(query, params, group)?)?;
        parse_hql_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtypes::RType;
    use serde_json::json;

    fn params(session: Option<&str>) -> ConnectionParams {
        ConnectionParams {
            host: "omero.example.org".into(),
            port: 4064,
            username: Some("alice".into()),
            password: session.is_none().then(|| "s3cret".into()),
            session_uuid: session.map(str::to_string),
        }
    }

    #[test]
    fn session_is_joined_by_key() {
        assert_eq!(
            login_args(&params(Some("abc-123"))),
            vec!["login", "-s", "omero.example.org", "-p", "4064", "-k", "abc-123"]
        );
        assert_eq!(
            login_args(&params(None)),
            vec!["login", "-s", "omero.example.org", "-p", "4064", "-u", "alice", "-w", "s3cret"]
        );
    }

    #[test]
    fn hql_command_line_queries_every_group() {
        let args = hql_args(
            "select p.id from Plate p where p.id = :id",
            &Parameters::new().add_id(42),
            ALL_GROUPS,
        )
        .unwrap();
        assert_eq!(
            args,
            vec![
                "hql",
                "-q",
                "--style",
                "csv",
                "--limit=-1",
                "--all",
                "select p.id from Plate p where p.id = 42"
            ]
        );
        let args = hql_args("select 1 from Plate p", &Parameters::new(), 3).unwrap();
        assert!(!args.contains(&"--all".to_string()));
    }

    #[test]
    fn placeholders_outside_quotes_are_bound() {
        let params = Parameters::new()
            .add("dstart", RType::Time(0))
            .add("dend", RType::Time(86_400_000));
        let q = "where t >= :dstart and t <= :dend and to_char(t, 'HH:MI') = 'x:y'";
        assert_eq!(
            bind_literals(q, &params).unwrap(),
            "where t >= '1970-01-01 00:00:00.000' and t <= '1970-01-02 00:00:00.000' \
             and to_char(t, 'HH:MI') = 'x:y'"
        );
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        assert!(matches!(
            bind_literals("where p.id = :id", &Parameters::new()),
            Err(Error::UnboundParameter(name)) if name == "id"
        ));
    }

    #[test]
    fn csv_output_drops_header_and_index() {
        let stdout = "#,Col1,Col2,Col3\n0,\"Screen, A\",51,\n1,2021,52,None\n(2 rows)\n";
        let rows = parse_hql_output(stdout).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![json!("Screen, A"), json!(51), json!(null)],
                vec![json!(2021), json!(52), json!(null)],
            ]
        );
        assert!(parse_hql_output("#,Col1\n").unwrap().is_empty());
        assert!(parse_hql_output("").unwrap().is_empty());
    }

    #[test]
    fn missing_program_is_reported() {
        let cli = OmeroCli {
            program: "/nonexistent/omero".into(),
        };
        assert!(matches!(
            cli.projection("select 1", &Parameters::new(), ALL_GROUPS),
            Err(Error::CliMissing { .. })
        ));
    }

    #[test]
    fn failing_login_is_refused() {
        let cli = OmeroCli {
            program: "false".into(),
        };
        assert!(matches!(
            cli.login(&params(Some("abc"))),
            Err(Error::Authentication)
        ));
    }
}
