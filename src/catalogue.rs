//! The fixed reports. Every query binds its identifiers as parameters rather than splicing them
//! into the query text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{Error, Result};
use crate::query::{push_name, Cells, Query, Record, Select};
use crate::rtypes::{Parameters, RType, Value};

///Projects and their datasets, including empty projects
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDataset {
    pub project_name: Option<String>,
    pub project_id: i64,
    pub project_owner: Option<String>,
    pub dataset_name: Option<String>,
    pub dataset_id: Option<i64>,
    pub dataset_owner: Option<String>,
}

impl ProjectDataset {
    pub fn query(names: bool) -> Query {
        Select::new(names)
            .name("project.name", "Project Name")
            .col("project.id", "Project ID")
            .col("project.details.owner.omeName", "Project Owner")
            .name("dataset.name", "Dataset Name")
            .col("dataset.id", "Dataset ID")
            .col("dsowner.omeName", "Dataset Owner")
            .from(
                "from Project project
                 left outer join project.datasetLinks pdlink
                 left outer join pdlink.child dataset
                 left outer join dataset.details.owner dsowner",
                Parameters::new(),
            )
    }
}

impl Record for ProjectDataset {
    fn from_cells(cells: &mut Cells) -> Result<Self> {
        Ok(ProjectDataset {
            project_name: cells.name()?,
            project_id: cells.int()?,
            project_owner: cells.opt_text()?,
            dataset_name: cells.name()?,
            dataset_id: cells.opt_int()?,
            dataset_owner: cells.opt_text()?,
        })
    }

    fn values(&self, names: bool) -> Vec<Value> {
        let mut v = Vec::new();
        push_name(&mut v, names, &self.project_name);
        v.push(self.project_id.into());
        v.push(self.project_owner.clone().into());
        push_name(&mut v, names, &self.dataset_name);
        v.push(self.dataset_id.into());
        v.push(self.dataset_owner.clone().into());
        v
    }
}

///Every field of every well in a plate
#[derive(Debug, Clone, PartialEq)]
pub struct PlateImage {
    pub plate_name: Option<String>,
    pub plate_id: i64,
    pub field: i64,
    pub well: String,
    pub image_id: i64,
}

impl PlateImage {
    pub fn query(plate: i64, names: bool) -> Query {
        Select::new(names)
            .name("plate.name", "Plate Name")
            .col("plate.id", "Plate ID")
            .col("index(ws)", "Field")
            .cols(&["well.row", "well.column"], "Well")
            .col("ws.image.id", "Image ID")
            .from(
                "from Well well
                 join well.plate plate
                 join well.wellSamples ws
                 where plate.id = :id
                 order by plate.id, index(ws), well.row, well.column, ws.image.id",
                Parameters::new().add_id(plate),
            )
    }
}

impl Record for PlateImage {
    fn from_cells(cells: &mut Cells) -> Result<Self> {
        Ok(PlateImage {
            plate_name: cells.name()?,
            plate_id: cells.int()?,
            field: cells.int()?,
            well: cells.well()?,
            image_id: cells.int()?,
        })
    }

    fn values(&self, names: bool) -> Vec<Value> {
        let mut v = Vec::new();
        push_name(&mut v, names, &self.plate_name);
        v.push(self.plate_id.into());
        v.push(self.field.into());
        v.push(self.well.as_str().into());
        v.push(self.image_id.into());
        v
    }
}

///Images in the datasets of a project
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectImage {
    pub project_name: Option<String>,
    pub dataset_name: Option<String>,
    pub dataset_id: i64,
    pub image_name: Option<String>,
    pub image_id: i64,
}

impl ProjectImage {
    pub fn query(project: i64, names: bool) -> Query {
        Select::new(names)
            .name("project.name", "Project Name")
            .name("dataset.name", "Dataset Name")
            .col("dataset.id", "Dataset ID")
            .name("image.name", "Image Name")
            .col("image.id", "Image ID")
            .from(
                "from Project project
                 join project.datasetLinks dlink
                 join dlink.child dataset
                 join dataset.imageLinks ilink
                 join ilink.child image
                 where project.id = :id",
                Parameters::new().add_id(project),
            )
    }
}

impl Record for ProjectImage {
    fn from_cells(cells: &mut Cells) -> Result<Self> {
        Ok(ProjectImage {
            project_name: cells.name()?,
            dataset_name: cells.name()?,
            dataset_id: cells.int()?,
            image_name: cells.name()?,
            image_id: cells.int()?,
        })
    }

    fn values(&self, names: bool) -> Vec<Value> {
        let mut v = Vec::new();
        push_name(&mut v, names, &self.project_name);
        push_name(&mut v, names, &self.dataset_name);
        v.push(self.dataset_id.into());
        push_name(&mut v, names, &self.image_name);
        v.push(self.image_id.into());
        v
    }
}

///Every field of every well of every plate in a screen
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenImage {
    pub screen_name: Option<String>,
    pub plate_name: Option<String>,
    pub plate_id: i64,
    pub field: i64,
    pub well: String,
    pub image_id: i64,
}

impl ScreenImage {
    pub fn query(screen: i64, names: bool) -> Query {
        Select::new(names)
            .name("screen.name", "Screen Name")
            .name("plate.name", "Plate Name")
            .col("plate.id", "Plate ID")
            .col("index(ws)", "Field")
            .cols(&["well.row", "well.column"], "Well")
            .col("ws.image.id", "Image ID")
            .from(
                "from Well well
                 join well.plate plate
                 join plate.screenLinks slink
                 join slink.parent screen
                 join well.wellSamples ws
                 where slink.parent.id = :id
                 order by plate.id, index(ws), well.row, well.column, ws.image.id",
                Parameters::new().add_id(screen),
            )
    }
}

impl Record for ScreenImage {
    fn from_cells(cells: &mut Cells) -> Result<Self> {
        Ok(ScreenImage {
            screen_name: cells.name()?,
            plate_name: cells.name()?,
            plate_id: cells.int()?,
            field: cells.int()?,
            well: cells.well()?,
            image_id: cells.int()?,
        })
    }

    fn values(&self, names: bool) -> Vec<Value> {
        let mut v = Vec::new();
        push_name(&mut v, names, &self.screen_name);
        push_name(&mut v, names, &self.plate_name);
        v.push(self.plate_id.into());
        v.push(self.field.into());
        v.push(self.well.as_str().into());
        v.push(self.image_id.into());
        v
    }
}

///The first field of every well of every plate in a screen. Names are always reported.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenFirstField {
    pub screen_name: Option<String>,
    pub plate_name: Option<String>,
    pub plate_id: i64,
    pub well: String,
    pub image_id: i64,
}

impl ScreenFirstField {
    pub fn query(screen: i64) -> Query {
        Select::new(true)
            .name("slink.parent.name", "Screen Name")
            .name("plate.name", "Plate Name")
            .col("plate.id", "Plate ID")
            .cols(&["well.row", "well.column"], "Well")
            .col("ws.image.id", "Image ID")
            .from(
                "from Well well
                 join well.plate plate
                 join well.wellSamples ws
                 join plate.screenLinks slink
                 where index(ws) = 0
                 and slink.parent.id = :id",
                Parameters::new().add_id(screen),
            )
    }
}

impl Record for ScreenFirstField {
    fn from_cells(cells: &mut Cells) -> Result<Self> {
        Ok(ScreenFirstField {
            screen_name: cells.name()?,
            plate_name: cells.name()?,
            plate_id: cells.int()?,
            well: cells.well()?,
            image_id: cells.int()?,
        })
    }

    fn values(&self, names: bool) -> Vec<Value> {
        let mut v = Vec::new();
        push_name(&mut v, names, &self.screen_name);
        push_name(&mut v, names, &self.plate_name);
        v.push(self.plate_id.into());
        v.push(self.well.as_str().into());
        v.push(self.image_id.into());
        v
    }
}

///Plates in a screen
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenPlate {
    pub screen_name: Option<String>,
    pub plate_name: Option<String>,
    pub plate_id: i64,
}

impl ScreenPlate {
    pub fn query(screen: i64, names: bool) -> Query {
        Select::new(names)
            .name("screen.name", "Screen Name")
            .name("plate.name", "Plate Name")
            .col("plate.id", "Plate ID")
            .from(
                "from Plate plate
                 join plate.screenLinks slink
                 join slink.parent screen
                 where slink.parent.id = :id",
                Parameters::new().add_id(screen),
            )
    }
}

impl Record for ScreenPlate {
    fn from_cells(cells: &mut Cells) -> Result<Self> {
        Ok(ScreenPlate {
            screen_name: cells.name()?,
            plate_name: cells.name()?,
            plate_id: cells.int()?,
        })
    }

    fn values(&self, names: bool) -> Vec<Value> {
        let mut v = Vec::new();
        push_name(&mut v, names, &self.screen_name);
        push_name(&mut v, names, &self.plate_name);
        v.push(self.plate_id.into());
        v
    }
}

///Experimenter details
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub institution: Option<String>,
    pub email: Option<String>,
    pub id: i64,
}

impl User {
    pub fn query() -> Query {
        Select::new(true)
            .col("experimenter.omeName", "Username")
            .col("experimenter.firstName", "Firstname")
            .col("experimenter.lastName", "Lastname")
            .col("experimenter.institution", "Institution")
            .col("experimenter.email", "Email")
            .col("experimenter.id", "ID")
            .from(
                "from Experimenter experimenter
                 order by experimenter.omeName desc",
                Parameters::new(),
            )
    }
}

impl Record for User {
    fn from_cells(cells: &mut Cells) -> Result<Self> {
        Ok(User {
            username: cells.text()?,
            first_name: cells.opt_text()?,
            last_name: cells.opt_text()?,
            institution: cells.opt_text()?,
            email: cells.opt_text()?,
            id: cells.int()?,
        })
    }

    fn values(&self, _names: bool) -> Vec<Value> {
        vec![
            self.username.as_str().into(),
            self.first_name.clone().into(),
            self.last_name.clone().into(),
            self.institution.clone().into(),
            self.email.clone().into(),
            self.id.into(),
        ]
    }
}

///Calendar truncation for the full import history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Period {
    Year,
    #[default]
    Month,
    Day,
}

impl Period {
    ///Format understood by the server's `TO_CHAR`
    pub fn pattern(self) -> &'static str {
        match self {
            Period::Year => "YYYY",
            Period::Month => "YYYY-MM",
            Period::Day => "YYYY-MM-DD",
        }
    }

    fn select_field(self) -> &'static str {
        match self {
            Period::Year => "to_char(event.time, 'YYYY') as cal_period",
            Period::Month => "to_char(event.time, 'YYYY-MM') as cal_period",
            Period::Day => "to_char(event.time, 'YYYY-MM-DD') as cal_period",
        }
    }
}

///Images imported per group, user and calendar period
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodImports {
    pub group: String,
    pub username: String,
    pub period: String,
    pub count: i64,
}

impl PeriodImports {
    ///Full history, newest period first within each group and user
    pub fn query(period: Period) -> Query {
        let p = period.pattern();
        let rest = format!(
            "from Image image
             join image.details.creationEvent event
             join image.details.owner experimenter
             join image.details.group grp
             group by grp.name, experimenter.omeName, to_char(event.time, '{p}')
             order by grp.name, experimenter.omeName, to_char(event.time, '{p}') desc"
        );
        Select::new(true)
            .col("grp.name", "Group")
            .col("experimenter.omeName", "Username")
            .col(period.select_field(), "Period")
            .col("count(event.time)", "Count")
            .from(&rest, Parameters::new())
    }
}

impl Record for PeriodImports {
    fn from_cells(cells: &mut Cells) -> Result<Self> {
        Ok(PeriodImports {
            group: cells.text()?,
            username: cells.text()?,
            period: cells.text()?,
            count: cells.int()?,
        })
    }

    fn values(&self, _names: bool) -> Vec<Value> {
        vec![
            self.group.as_str().into(),
            self.username.as_str().into(),
            self.period.as_str().into(),
            self.count.into(),
        ]
    }
}

///Images imported per group and user, optionally between two instants
#[derive(Debug, Clone, PartialEq)]
pub struct Imports {
    pub group: String,
    pub username: String,
    pub count: i64,
}

impl Imports {
    pub fn query(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Query {
        let mut params = Parameters::new();
        let mut conditions = Vec::new();
        if let Some(start) = start {
            conditions.push("event.time >= :dstart");
            params = params.add("dstart", RType::Time(start.timestamp_millis()));
        }
        if let Some(end) = end {
            conditions.push("event.time <= :dend");
            params = params.add("dend", RType::Time(end.timestamp_millis()));
        }
        let filter = if conditions.is_empty() {
            String::new()
        } else {
            format!("where {}", conditions.join(" and "))
        };
        let rest = format!(
            "from Image image
             join image.details.creationEvent event
             join image.details.owner experimenter
             join image.details.group grp
             {filter}
             group by grp.name, experimenter.omeName"
        );
        Select::new(true)
            .col("grp.name", "Group")
            .col("experimenter.omeName", "Username")
            .col("count(event.time)", "Count")
            .from(&rest, params)
    }
}

impl Record for Imports {
    fn from_cells(cells: &mut Cells) -> Result<Self> {
        Ok(Imports {
            group: cells.text()?,
            username: cells.text()?,
            count: cells.int()?,
        })
    }

    fn values(&self, _names: bool) -> Vec<Value> {
        vec![
            self.group.as_str().into(),
            self.username.as_str().into(),
            self.count.into(),
        ]
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%d %B %Y", "%d %b %Y", "%B %d %Y", "%b %d %Y",
    "%B %d, %Y", "%b %d, %Y",
];

///Parse a loosely written timestamp. Times without an offset are taken as UTC, dates without a
///time as midnight.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_rfc2822(text) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(t.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, format) {
            return Ok(d.and_time(NaiveTime::MIN).and_utc());
        }
    }
    //year-month and bare years start at the first day
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN).and_utc());
    }
    if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(d) = NaiveDate::parse_from_str(&format!("{text}-01-01"), "%Y-%m-%d") {
            return Ok(d.and_time(NaiveTime::MIN).and_utc());
        }
    }
    Err(Error::Date(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::{manager, FakeServer};
    use crate::query::Report;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn nonames_drops_every_name_column() {
        let q = ProjectDataset::query(false);
        assert_eq!(
            q.header,
            vec!["Project ID", "Project Owner", "Dataset ID", "Dataset Owner"]
        );
        assert!(!q.hql.contains(".name"));
        for q in [
            PlateImage::query(1, false),
            ProjectImage::query(1, false),
            ScreenImage::query(1, false),
            ScreenPlate::query(1, false),
        ] {
            assert!(q.header.iter().all(|h| !h.ends_with("Name")), "{:?}", q.header);
            assert!(q.header.iter().any(|h| h.ends_with("ID")));
            assert!(!q.hql.contains(".name"), "{}", q.hql);
        }
    }

    #[test]
    fn names_are_selected_by_default() {
        let q = ScreenImage::query(9, true);
        assert_eq!(
            q.header,
            vec!["Screen Name", "Plate Name", "Plate ID", "Field", "Well", "Image ID"]
        );
        assert!(q.hql.starts_with("select screen.name,"));
        assert_eq!(q.params.get("id"), Some(&RType::Long(9)));
        assert!(q.hql.contains(":id"));
    }

    #[test]
    fn screen_images_end_to_end_without_names() {
        //plate id, field, row, column, image id
        let server = FakeServer::with_rows(json!([
            [{"val": 11}, {"val": 0}, {"val": 3}, {"val": 1}, {"val": 501}],
            [{"val": 11}, {"val": 1}, {"val": 0}, {"val": 0}, {"val": 502}]
        ]));
        let journal = server.journal.clone();
        let (mut manager, _dir) = manager(server);
        let query = ScreenImage::query(42, false);
        let report: Report<ScreenImage> = Report::fetch(&mut manager, &query).unwrap();
        assert_eq!(report.rows[0].well, "D2");
        assert_eq!(report.rows[1].well, "A1");
        assert_eq!(report.header, vec!["Plate ID", "Field", "Well", "Image ID"]);

        let mut printed = Vec::new();
        report.print(&mut printed).unwrap();
        let printed = String::from_utf8(printed).unwrap();
        assert_eq!(
            printed,
            "Plate ID, Field, Well, Image ID\n11, 0, D2, 501\n11, 1, A1, 502\n"
        );

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("screen.csv");
        report.emit(true, Some(file.as_path())).unwrap();
        let csv = std::fs::read_to_string(&file).unwrap();
        assert_eq!(
            csv.lines().next(),
            Some(r#""Plate ID","Field","Well","Image ID""#)
        );
        assert!(!csv.contains("Name"));
        assert_eq!(journal.borrow().queries[0].1.get("id"), Some(&RType::Long(42)));
    }

    #[test]
    fn outer_join_nulls_survive() {
        let query = ProjectDataset::query(true);
        let rows = vec![vec![
            Value::Str("empty project".into()),
            Value::Int(3),
            Value::Str("alice".into()),
            Value::Null,
            Value::Null,
            Value::Null,
        ]];
        let report: Report<ProjectDataset> = Report::from_rows(&query, rows).unwrap();
        assert_eq!(report.rows[0].dataset_id, None);
        assert_eq!(
            report.values()[0],
            vec![
                Value::Str("empty project".into()),
                Value::Int(3),
                Value::Str("alice".into()),
                Value::Null,
                Value::Null,
                Value::Null
            ]
        );
    }

    #[test]
    fn short_rows_are_reported() {
        let query = ScreenPlate::query(1, true);
        let rows = vec![vec![Value::Str("screen".into()), Value::Int(1)]];
        assert!(Report::<ScreenPlate>::from_rows(&query, rows).is_err());
    }

    #[test]
    fn period_report_uses_truncation_pattern() {
        let q = PeriodImports::query(Period::Day);
        assert!(q.hql.contains("to_char(event.time, 'YYYY-MM-DD') as cal_period"));
        assert!(q.hql.trim_end().ends_with("desc"));
        assert_eq!(q.header, vec!["Group", "Username", "Period", "Count"]);
        assert_eq!(Period::default().pattern(), "YYYY-MM");
    }

    #[test]
    fn bounded_report_binds_times() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let q = Imports::query(Some(start), None);
        assert!(q.hql.contains("where event.time >= :dstart\n"));
        assert!(!q.hql.contains(":dend"));
        assert_eq!(
            q.params.get("dstart"),
            Some(&RType::Time(1_577_836_800_000))
        );
        let q = Imports::query(Some(start), Some(start));
        assert!(q.hql.contains(":dstart and event.time <= :dend"));
        let q = Imports::query(None, None);
        assert!(!q.hql.contains("where"));
        assert_eq!(q.params, Parameters::new());
    }

    #[test]
    fn timestamps_parse_leniently() {
        let midnight = Utc.with_ymd_and_hms(2021, 3, 4, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2021-03-04").unwrap(), midnight);
        assert_eq!(parse_timestamp("2021/03/04").unwrap(), midnight);
        assert_eq!(parse_timestamp("4 March 2021").unwrap(), midnight);
        assert_eq!(parse_timestamp("March 4, 2021").unwrap(), midnight);
        assert_eq!(
            parse_timestamp("2021-03-04T10:30:00").unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 4, 10, 30, 0).unwrap()
        );
        assert_eq!(
            parse_timestamp("2021-03-04T10:30:00+01:00").unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 4, 9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_timestamp("2021-03").unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap()
        );
        assert!(matches!(parse_timestamp("last tuesday"), Err(Error::Date(_))));
    }
}
