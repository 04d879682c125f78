//! The fixed set of indicator categories and the typed record produced per city.

use crate::parse::{number_after_label, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Gdp,
    Population,
    Education,
    Enrollment,
    Health,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Gdp,
        Category::Population,
        Category::Education,
        Category::Enrollment,
        Category::Health,
    ];

    /// Stable name, also used as the file stem of every table of this category.
    pub fn name(self) -> &'static str {
        match self {
            Category::Gdp => "gdp",
            Category::Population => "population",
            Category::Education => "education",
            Category::Enrollment => "enrollment",
            Category::Health => "health",
        }
    }

    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Survey path on the portal, `/{survey}/{indicator}`.
    pub fn default_path_suffix(self) -> &'static str {
        match self {
            Category::Gdp => "/38/46996",
            Category::Population => "/23/27652",
            Category::Education => "/23/22469",
            Category::Enrollment => "/13/78117",
            Category::Health => "/32/28163",
        }
    }

    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Category::Gdp => Gdp::FIELDS,
            Category::Population => Population::FIELDS,
            Category::Education => Education::FIELDS,
            Category::Enrollment => Enrollment::FIELDS,
            Category::Health => Health::FIELDS,
        }
    }

    /// `city`, the category fields, then `year`.
    pub fn header(self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.fields().len() + 2);
        header.push(CITY_COLUMN.to_string());
        header.extend(self.fields().iter().map(|f| f.to_string()));
        header.push(YEAR_COLUMN.to_string());
        header
    }
}

pub const CITY_COLUMN: &str = "city";
pub const YEAR_COLUMN: &str = "year";

/// Values of one category, extracted from the tables of its page.
pub trait Indicator: Default + Clone + Send + 'static {
    const CATEGORY: Category;
    const FIELDS: &'static [&'static str];

    /// Pure: the same tables always give the same values. Missing labels give `None`.
    fn extract(tables: &[Table]) -> Self;

    /// In `FIELDS` order.
    fn values(&self) -> Vec<Option<f64>>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gdp {
    /// In BRL; the portal reports thousands.
    pub gdp: Option<f64>,
}

impl Indicator for Gdp {
    const CATEGORY: Category = Category::Gdp;
    const FIELDS: &'static [&'static str] = &["gdp"];

    fn extract(tables: &[Table]) -> Self {
        let gdp = tables
            .first()
            .and_then(|t| t.cell(1, 1))
            .and_then(crate::parse::parse_number)
            .map(|thousands| thousands * 1000.0);
        Gdp { gdp }
    }

    fn values(&self) -> Vec<Option<f64>> {
        vec![self.gdp]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Population {
    pub resident: Option<f64>,
}

impl Indicator for Population {
    const CATEGORY: Category = Category::Population;
    const FIELDS: &'static [&'static str] = &["resident_population"];

    fn extract(tables: &[Table]) -> Self {
        let resident = tables
            .first()
            .and_then(|t| number_after_label(t, "População residente (pessoas)"));
        Population { resident }
    }

    fn values(&self) -> Vec<Option<f64>> {
        vec![self.resident]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Education {
    pub attending: Option<f64>,
    pub not_attending: Option<f64>,
    pub no_instruction: Option<f64>,
    pub fundamental: Option<f64>,
    pub secondary: Option<f64>,
    pub higher: Option<f64>,
}

impl Indicator for Education {
    const CATEGORY: Category = Category::Education;
    const FIELDS: &'static [&'static str] = &[
        "attending_school",
        "not_attending_school",
        "no_instruction",
        "fundamental_level",
        "secondary_level",
        "higher_level",
    ];

    fn extract(tables: &[Table]) -> Self {
        let Some(table) = tables.first() else {
            return Education::default();
        };
        Education {
            attending: number_after_label(table, "Frequentavam (pessoas)"),
            not_attending: number_after_label(table, "Não frequentavam (pessoas)"),
            no_instruction: number_after_label(table, "Sem instrução e fundamental incompleto (pessoas)"),
            fundamental: number_after_label(table, "Fundamental completo e médio incompleto (pessoas)"),
            secondary: number_after_label(table, "Médio completo e superior incompleto (pessoas)"),
            higher: number_after_label(table, "Superior completo (pessoas)"),
        }
    }

    fn values(&self) -> Vec<Option<f64>> {
        vec![
            self.attending,
            self.not_attending,
            self.no_instruction,
            self.fundamental,
            self.secondary,
            self.higher,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrollment {
    pub infant: Option<f64>,
    pub fundamental: Option<f64>,
    pub secondary: Option<f64>,
}

impl Indicator for Enrollment {
    const CATEGORY: Category = Category::Enrollment;
    const FIELDS: &'static [&'static str] = &[
        "enrollment_infant",
        "enrollment_fundamental",
        "enrollment_secondary",
    ];

    fn extract(tables: &[Table]) -> Self {
        // Pages of other school census years come without the enrollment block.
        match tables.first() {
            Some(table) if table.has_label("Matrículas") => Enrollment {
                infant: number_after_label(table, "Ensino infantil (matrículas)"),
                fundamental: number_after_label(table, "Ensino fundamental (matrículas)"),
                secondary: number_after_label(table, "Ensino médio (matrículas)"),
            },
            _ => Enrollment::default(),
        }
    }

    fn values(&self) -> Vec<Option<f64>> {
        vec![self.infant, self.fundamental, self.secondary]
    }
}

const HOSPITAL_BEDS_LABEL: &str = "Número de leitos para internação em estabelecimentos de saúde (leitos)";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Health {
    pub public_facilities: Option<f64>,
    pub public_beds: Option<f64>,
}

impl Indicator for Health {
    const CATEGORY: Category = Category::Health;
    const FIELDS: &'static [&'static str] = &["public_health_facilities", "public_hospital_beds"];

    fn extract(tables: &[Table]) -> Self {
        let Some(table) = tables.first() else {
            return Health::default();
        };
        // "Público (leitos)" shows up once per bed type; the last one is the total.
        let public_beds = if table.has_label(HOSPITAL_BEDS_LABEL) {
            table
                .values_for_label("Público (leitos)")
                .last()
                .and_then(|v| crate::parse::parse_number(v))
        } else {
            None
        };
        Health {
            public_facilities: number_after_label(table, "Público (estabelecimentos)"),
            public_beds,
        }
    }

    fn values(&self) -> Vec<Option<f64>> {
        vec![self.public_facilities, self.public_beds]
    }
}

/// One category's values for one city, with the reference year the page was showing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reading<T> {
    pub values: T,
    pub year: Option<String>,
}

impl<T: Indicator> Reading<T> {
    /// What a category ends up as when every attempt came back empty.
    pub fn missing() -> Self {
        Reading {
            values: T::default(),
            year: None,
        }
    }

    pub fn row(&self, city_id: &str) -> Row {
        Row {
            city: city_id.to_string(),
            values: self.values.values(),
            year: self.year.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct City {
    pub id: String,
    pub display_name: String,
}

impl City {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        City {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Every category for one city. Categories that came back empty are all-null, never absent.
#[derive(Debug, Clone, PartialEq)]
pub struct CityRecord {
    pub city: City,
    pub gdp: Reading<Gdp>,
    pub population: Reading<Population>,
    pub education: Reading<Education>,
    pub enrollment: Reading<Enrollment>,
    pub health: Reading<Health>,
}

impl CityRecord {
    pub fn empty(city: City) -> Self {
        CityRecord {
            city,
            gdp: Reading::missing(),
            population: Reading::missing(),
            education: Reading::missing(),
            enrollment: Reading::missing(),
            health: Reading::missing(),
        }
    }

    pub fn row(&self, category: Category) -> Row {
        let id = self.city.id.as_str();
        match category {
            Category::Gdp => self.gdp.row(id),
            Category::Population => self.population.row(id),
            Category::Education => self.education.row(id),
            Category::Enrollment => self.enrollment.row(id),
            Category::Health => self.health.row(id),
        }
    }
}

/// A flattened reading, as it is written to a category table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub city: String,
    pub values: Vec<Option<f64>>,
    pub year: Option<String>,
}

impl Row {
    pub fn cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(self.values.len() + 2);
        cells.push(self.city.clone());
        cells.extend(self.values.iter().map(|v| format_number(*v)));
        cells.push(self.year.clone().unwrap_or_default());
        cells
    }
}

/// Empty for null, integers without a fractional part.
pub fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> Table {
        Table::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn header_matches_fields() {
        for category in Category::ALL {
            let header = category.header();
            assert_eq!(header.first().map(String::as_str), Some(CITY_COLUMN));
            assert_eq!(header.last().map(String::as_str), Some(YEAR_COLUMN));
            assert_eq!(header.len(), category.fields().len() + 2);
            assert_eq!(Category::from_name(category.name()), Some(category));
        }
    }

    #[test]
    fn gdp_is_scaled_from_thousands() {
        let t = table(&[&["Ano", "Valor"], &["PIB a preços correntes", "1.234,5"]]);
        assert_eq!(Gdp::extract(&[t]).gdp, Some(1_234_500.0));
        assert_eq!(Gdp::extract(&[]).gdp, None);
    }

    #[test]
    fn enrollment_requires_enrollment_block() {
        let with = table(&[
            &["Matrículas", ""],
            &["Ensino infantil (matrículas)", "1.020"],
            &["Ensino fundamental (matrículas)", "5.400"],
            &["Ensino médio (matrículas)", "1.800"],
        ]);
        let got = Enrollment::extract(&[with]);
        assert_eq!(got.infant, Some(1020.0));
        assert_eq!(got.secondary, Some(1800.0));

        let without = table(&[&["Ensino infantil (matrículas)", "1.020"]]);
        assert_eq!(Enrollment::extract(&[without]), Enrollment::default());
    }

    #[test]
    fn health_takes_last_public_beds_row() {
        let t = table(&[
            &["Público (estabelecimentos)", "12"],
            &[HOSPITAL_BEDS_LABEL, ""],
            &["Público (leitos)", "30"],
            &["Público (leitos)", "45"],
        ]);
        let got = Health::extract(&[t]);
        assert_eq!(got.public_facilities, Some(12.0));
        assert_eq!(got.public_beds, Some(45.0));
    }

    #[test]
    fn missing_record_renders_empty_cells() {
        let record = CityRecord::empty(City::new("natal", "Natal"));
        assert_eq!(
            record.row(Category::Education).cells(),
            vec!["natal", "", "", "", "", "", "", ""]
        );
        let mut record = record;
        record.gdp = Reading {
            values: Gdp { gdp: Some(2500.0) },
            year: Some("2018".into()),
        };
        assert_eq!(record.row(Category::Gdp).cells(), vec!["natal", "2500", "2018"]);
    }
}
