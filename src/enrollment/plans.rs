use serde::{Deserialize, Serialize};

/// Billing period of a plan as written in the catalog (`"mes"`, `"año"`, `"trimestre"`).
///
/// Unknown strings are kept verbatim in `Other` and bill monthly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Period {
    Monthly,
    Yearly,
    Quarterly,
    Other(String),
}

impl Period {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Monthly => "mes",
            Self::Yearly => "año",
            Self::Quarterly => "trimestre",
            Self::Other(s) => s,
        }
    }

    /// Months between two charges; also the length of the subscription mandate.
    pub fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Yearly => 12,
            Self::Quarterly => 3,
            Self::Other(_) => 1,
        }
    }

    pub fn periodicity(&self) -> Periodicity {
        Periodicity {
            number: self.months(),
            unit: PeriodicityUnit::Month,
        }
    }
}

impl From<String> for Period {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "mes" => Self::Monthly,
            "año" => Self::Yearly,
            "trimestre" => Self::Quarterly,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for Period {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        match p {
            Period::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodicityUnit {
    Month,
}

impl PeriodicityUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "MONTH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Periodicity {
    pub number: u32,
    pub unit: PeriodicityUnit,
}

/// A subscription offering shown on the services page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    /// Price in whole Chilean pesos.
    pub price: i64,
    pub period: Period,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub featured: bool,
}

/// The static plan catalog.
pub fn catalog() -> Vec<Plan> {
    vec![
        Plan {
            name: "Básico".to_string(),
            price: 7990,
            period: Period::Monthly,
            features: to_strings(&[
                "2 recolectadas de basura por semana",
                "Sin personalización de horarios",
                "Soporte vía email y WhatsApp",
                "Cancelar en cualquier momento",
                "Rutas estándar de recolección",
            ]),
            featured: false,
        },
        Plan {
            name: "Premium".to_string(),
            price: 10000,
            period: Period::Monthly,
            features: to_strings(&[
                "3 recolectadas de basura por semana",
                "Personalización de días y horarios",
                "Prioridad en rutas de recolección",
                "Soporte prioritario vía email y WhatsApp",
                "Flexibilidad total en programación",
                "Todo lo del plan Básico",
            ]),
            featured: true,
        },
        Plan {
            name: "Básico Anual".to_string(),
            price: 80000,
            period: Period::Yearly,
            features: to_strings(&[
                "2 recolectadas de basura por semana",
                "Sin personalización de horarios",
                "Soporte vía email y WhatsApp",
                "Ahorro de 2 meses al pagar anual",
                "Rutas estándar de recolección",
                "Cancelar en cualquier momento",
            ]),
            featured: false,
        },
    ]
}

/// Look up a catalog plan by exact name.
pub fn find_plan(name: &str) -> Option<Plan> {
    catalog().into_iter().find(|p| p.name == name)
}

/// Format a CLP amount the way the pricing cards show it, e.g. `$10.000`.
pub fn format_clp(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
