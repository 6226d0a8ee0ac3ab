//! Expands the catalog into the cross-product of request URLs.
//!
//! Each OTA's requests are the product of a fixed list of dimensions
//! (identifier, checkin, checkout, page). Whether a dimension takes part is
//! decided by the OTA's `required_inputs` and the dimension's presence rule.

mod params;

pub use params::{
    GenerationParams, IdentifierDomain, DEFAULT_CHECKOUT_OFFSET, DEFAULT_PAGE_OFFSET,
    DEFAULT_PAGE_UPPER_LIMIT,
};

use crate::catalog::ParameterCatalog;
use crate::error::{ConfigurationError, TemplateError};
use crate::models::{PropertySpec, RequestDescriptor, RequestParams};
use crate::template;
use chrono::NaiveDate;
use std::fmt;
use tracing::{debug, info, warn};

/// How an OTA's `required_inputs` decides whether a dimension takes part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    /// Varied for every OTA, whether or not its template uses it
    Always,
    /// Varied when required; an OTA that does not require it gets no requests
    Gate,
    /// Bound when required, skipped otherwise
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Domain {
    Identifier,
    Checkin,
    /// One checkout per checkin, `checkout_offset` nights later
    Checkout,
    Page,
}

#[derive(Debug, Clone, Copy)]
struct Dimension {
    domain: Domain,
    presence: Presence,
    /// Pair values one-to-one with the previous dimension instead of
    /// multiplying with it
    paired: bool,
}

/// Outermost first. Checkin gates page, so an OTA without `checkin` in its
/// inputs produces nothing even when it paginates.
const DIMENSIONS: [Dimension; 4] = [
    Dimension {
        domain: Domain::Identifier,
        presence: Presence::Always,
        paired: false,
    },
    Dimension {
        domain: Domain::Checkin,
        presence: Presence::Gate,
        paired: false,
    },
    Dimension {
        domain: Domain::Checkout,
        presence: Presence::Optional,
        paired: true,
    },
    Dimension {
        domain: Domain::Page,
        presence: Presence::Gate,
        paired: false,
    },
];

/// One concrete value bound to a placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamValue {
    Identifier(String),
    Checkin(NaiveDate),
    Checkout(NaiveDate),
    Page(u32),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(id) => f.write_str(id),
            Self::Checkin(date) | Self::Checkout(date) => write!(f, "{}", date),
            Self::Page(page) => write!(f, "{}", page),
        }
    }
}

type Binding = (&'static str, ParamValue);

impl Domain {
    fn field(self, params: &GenerationParams) -> &'static str {
        match self {
            Self::Identifier => params.identifier_domain.placeholder(),
            Self::Checkin => "checkin",
            Self::Checkout => "checkout",
            Self::Page => "page",
        }
    }

    fn len(self, identifiers: &[String], params: &GenerationParams) -> u64 {
        match self {
            Self::Identifier => identifiers.len() as u64,
            Self::Checkin | Self::Checkout => params.checkin_days() as u64,
            Self::Page => params.page_count(),
        }
    }

    /// The value at `index`, `None` when it cannot be represented
    fn value(self, index: u64, identifiers: &[String], params: &GenerationParams) -> Option<ParamValue> {
        match self {
            Self::Identifier => identifiers
                .get(usize::try_from(index).ok()?)
                .cloned()
                .map(ParamValue::Identifier),
            Self::Checkin => params
                .checkin_date(i64::try_from(index).ok()?)
                .map(ParamValue::Checkin),
            Self::Checkout => params
                .checkout_date(i64::try_from(index).ok()?)
                .map(ParamValue::Checkout),
            Self::Page => params.page(index).map(ParamValue::Page),
        }
    }
}

/// Why an OTA contributed no (further) requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InvalidTemplate(TemplateError),
    /// The OTA does not take an input that gates generation
    MissingInput(&'static str),
    /// A placeholder value fell outside its representable range
    OutOfRange(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTemplate(err) => write!(f, "{}", err),
            Self::MissingInput(field) => {
                write!(f, "inputs do not include {}, no requests generated", field)
            }
            Self::OutOfRange(field) => write!(f, "{} value out of range, remaining requests dropped", field),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaSkip {
    pub ota_id: String,
    pub reason: SkipReason,
}

/// One step of a request plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanEntry {
    Request(RequestDescriptor),
    Skipped(OtaSkip),
}

/// Everything a plan produced, gathered eagerly
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub requests: Vec<RequestDescriptor>,
    pub skipped: Vec<OtaSkip>,
}

/// Generates request descriptors for every OTA in a catalog
#[derive(Debug, Clone)]
pub struct RequestPlanGenerator {
    params: GenerationParams,
}

impl RequestPlanGenerator {
    /// Validate the parameters and settle the effective date range
    pub fn new(mut params: GenerationParams) -> Result<Self, ConfigurationError> {
        params.validate()?;
        params.end_date = params.effective_end_date();
        Ok(Self { params })
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Lazily expand `catalog` over `identifiers`.
    ///
    /// Order: OTAs in catalog order, then identifiers, ascending checkin day,
    /// ascending page.
    pub fn generate<'a>(
        &'a self,
        catalog: &'a ParameterCatalog,
        identifiers: &'a [String],
    ) -> RequestPlan<'a> {
        RequestPlan {
            specs: catalog.into_iter(),
            identifiers,
            params: &self.params,
            current: None,
        }
    }
}

/// Lazy sequence of [`PlanEntry`] values
pub struct RequestPlan<'a> {
    specs: std::slice::Iter<'a, PropertySpec>,
    identifiers: &'a [String],
    params: &'a GenerationParams,
    current: Option<OtaRequests<'a>>,
}

impl<'a> RequestPlan<'a> {
    /// Drain the plan, separating requests from skipped OTAs
    pub fn into_report(self) -> GenerationReport {
        let mut report = GenerationReport::default();
        for entry in self {
            match entry {
                PlanEntry::Request(request) => report.requests.push(request),
                PlanEntry::Skipped(skip) => report.skipped.push(skip),
            }
        }
        report
    }

    fn start_ota(&self, spec: &'a PropertySpec) -> Result<OtaRequests<'a>, SkipReason> {
        info!("Processing {} ...", spec.ota_id);

        let no_values: [(&str, &str); 0] = [];
        template::expand(&spec.url_template, &no_values).map_err(SkipReason::InvalidTemplate)?;

        let axes = build_axes(spec, self.identifiers, self.params)?;
        Ok(OtaRequests::new(spec, axes, self.identifiers, self.params))
    }
}

impl<'a> Iterator for RequestPlan<'a> {
    type Item = PlanEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(Ok(request)) => return Some(PlanEntry::Request(request)),
                    Some(Err(reason)) => {
                        let ota_id = current.spec.ota_id.clone();
                        self.current = None;
                        warn!("Skipping OTA {}: {}", ota_id, reason);
                        return Some(PlanEntry::Skipped(OtaSkip { ota_id, reason }));
                    }
                    None => self.current = None,
                }
            }

            let spec = self.specs.next()?;
            match self.start_ota(spec) {
                Ok(requests) => self.current = Some(requests),
                Err(reason) => {
                    match reason {
                        SkipReason::MissingInput(_) => info!("OTA {}: {}", spec.ota_id, reason),
                        _ => warn!("Skipping OTA {}: {}", spec.ota_id, reason),
                    }
                    return Some(PlanEntry::Skipped(OtaSkip {
                        ota_id: spec.ota_id.clone(),
                        reason,
                    }));
                }
            }
        }
    }
}

/// One odometer wheel. Paired dimensions share the wheel's index.
#[derive(Debug)]
struct Axis {
    len: u64,
    dimensions: Vec<(&'static str, Domain)>,
}

fn build_axes(
    spec: &PropertySpec,
    identifiers: &[String],
    params: &GenerationParams,
) -> Result<Vec<Axis>, SkipReason> {
    let mut axes: Vec<Axis> = Vec::with_capacity(DIMENSIONS.len());

    for dimension in DIMENSIONS {
        let field = dimension.domain.field(params);
        let required = spec.requires(field);
        match dimension.presence {
            Presence::Gate if !required => return Err(SkipReason::MissingInput(field)),
            Presence::Optional if !required => continue,
            _ => {}
        }

        let len = dimension.domain.len(identifiers, params);
        if dimension.paired {
            if let Some(previous) = axes.last_mut() {
                previous.len = previous.len.min(len);
                previous.dimensions.push((field, dimension.domain));
                continue;
            }
        }
        axes.push(Axis {
            len,
            dimensions: vec![(field, dimension.domain)],
        });
    }

    debug!(
        "OTA {}: axis sizes {:?}",
        spec.ota_id,
        axes.iter().map(|axis| axis.len).collect::<Vec<_>>()
    );
    Ok(axes)
}

/// Odometer over the axes of one OTA, last axis fastest. Values are computed
/// from the cursor, so no axis is materialized.
struct OtaRequests<'a> {
    spec: &'a PropertySpec,
    identifiers: &'a [String],
    params: &'a GenerationParams,
    axes: Vec<Axis>,
    cursor: Vec<u64>,
    exhausted: bool,
}

impl<'a> OtaRequests<'a> {
    fn new(
        spec: &'a PropertySpec,
        axes: Vec<Axis>,
        identifiers: &'a [String],
        params: &'a GenerationParams,
    ) -> Self {
        let exhausted = axes.iter().any(|axis| axis.len == 0);
        let cursor = vec![0; axes.len()];
        Self {
            spec,
            identifiers,
            params,
            axes,
            cursor,
            exhausted,
        }
    }

    fn advance(&mut self) {
        for (position, axis) in self.cursor.iter_mut().zip(&self.axes).rev() {
            *position += 1;
            if *position < axis.len {
                return;
            }
            *position = 0;
        }
        self.exhausted = true;
    }

    fn bindings(&self) -> Result<Vec<Binding>, SkipReason> {
        let mut bindings = Vec::with_capacity(DIMENSIONS.len());
        for (&position, axis) in self.cursor.iter().zip(&self.axes) {
            for &(field, domain) in &axis.dimensions {
                let value = domain
                    .value(position, self.identifiers, self.params)
                    .ok_or(SkipReason::OutOfRange(field))?;
                bindings.push((field, value));
            }
        }
        Ok(bindings)
    }

    fn describe(&self) -> Result<RequestDescriptor, SkipReason> {
        let bindings = self.bindings()?;

        let values: Vec<(&str, &ParamValue)> =
            bindings.iter().map(|(field, value)| (*field, value)).collect();
        let resolved_url = template::expand(&self.spec.url_template, &values)
            .map_err(SkipReason::InvalidTemplate)?;

        let mut params = RequestParams {
            identifier: String::new(),
            checkin: None,
            checkout: None,
            page: None,
        };
        for (_, value) in bindings {
            match value {
                ParamValue::Identifier(id) => params.identifier = id,
                ParamValue::Checkin(date) => params.checkin = Some(date),
                ParamValue::Checkout(date) => params.checkout = Some(date),
                ParamValue::Page(page) => params.page = Some(page),
            }
        }

        Ok(RequestDescriptor {
            ota_id: self.spec.ota_id.clone(),
            resolved_url,
            params,
        })
    }
}

impl Iterator for OtaRequests<'_> {
    type Item = Result<RequestDescriptor, SkipReason>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let request = self.describe();
        match request {
            Ok(_) => self.advance(),
            Err(_) => self.exhausted = true,
        }
        Some(request)
    }
}
