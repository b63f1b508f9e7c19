//! Operation interpreter.
//!
//! Turns a [`ParameterMap`] into a typed [`Plan`] and runs it through an
//! [`ImageBackend`]. Validation is done up front by [`plan`], so a bad map is
//! rejected before any pixel work starts.
//!
//! ## Operations
//!
//! | Name | Bare form | Structured fields |
//! |---|---|---|
//! | `resize` | — | `width`, `height`, `master` |
//! | `crop` | — | `width`*, `height`*, `offset_x`, `offset_y` |
//! | `scaleAndCrop` | — | `width`*, `height`* |
//! | `rotate` | degrees | `degrees`* |
//! | `flip` | direction | `direction`* |
//! | `sharpen` | amount | `amount`* |
//! | `reflection` | — | `height`, `opacity`, `fade_in` |
//! | `watermark` | image or path | `watermark`*, `offset_x`, `offset_y`, `opacity` |
//! | `background` | color | `color`*, `opacity` |
//! | `quality` | 0–100 | — |
//! | `type` | extension | — |
//!
//! `*` marks a mandatory field. A null value counts as absent.

use crate::imaging::{
    BackendError, BackgroundArgs, Color, CropArgs, FlipDirection, ImageBackend, Master, Offset,
    OutputFormat, Quality, ReflectionArgs, ResizeArgs, WatermarkArgs,
};
use crate::params::{Args, Param, ParameterMap, SharedImage, Value};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest width or height accepted in a parameter map.
pub const MAX_DIMENSION: u32 = 65_535;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unknown operation \"{0}\"")]
    UnknownOperation(String),
    #[error("operation \"{operation}\" requires \"{field}\"")]
    MissingField { operation: String, field: String },
    #[error("operation \"{operation}\": invalid {field}: {reason}")]
    InvalidValue {
        operation: String,
        field: String,
        reason: String,
    },
    #[error("unsupported output type \"{0}\"")]
    UnsupportedFormat(String),
}

#[derive(Error, Debug)]
pub enum InterpretError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Where a watermark comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkSource {
    Image(SharedImage),
    /// Public path, resolved against the web root when applied.
    Path(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Resize(ResizeArgs),
    Crop(CropArgs),
    /// Cover `width`×`height`, then cut the centered window of that size.
    ScaleAndCrop {
        width: u32,
        height: u32,
    },
    Rotate(f64),
    Flip(FlipDirection),
    Sharpen(u8),
    Reflection(ReflectionArgs),
    Watermark {
        source: WatermarkSource,
        args: WatermarkArgs,
    },
    Background(BackgroundArgs),
}

/// A validated parameter map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    /// Pixel operations, in map order.
    pub operations: Vec<Operation>,
    /// From `quality`; `None` means the configured default.
    pub quality: Option<Quality>,
    /// From `type`: the lowercased extension and its encoder.
    pub output: Option<(String, OutputFormat)>,
}

impl Plan {
    pub fn extension(&self) -> Option<&str> {
        self.output.as_ref().map(|(ext, _)| ext.as_str())
    }

    pub fn format(&self) -> Option<OutputFormat> {
        self.output.as_ref().map(|(_, format)| *format)
    }
}

/// Validate `params` into a [`Plan`].
///
/// Fails on the first offending operation, in map order.
pub fn plan(params: &ParameterMap) -> Result<Plan, ValidationError> {
    let mut plan = Plan::default();

    for (name, param) in params.iter() {
        let op = OpParser { name, param };
        match name {
            "resize" => {
                let args = op.fields()?;
                plan.operations.push(Operation::Resize(ResizeArgs {
                    width: op.optional_dimension(args, "width")?,
                    height: op.optional_dimension(args, "height")?,
                    master: op.master(field(args, "master"))?,
                }));
            }
            "crop" => {
                let args = op.fields()?;
                plan.operations.push(Operation::Crop(CropArgs {
                    width: op.required_dimension(args, "width")?,
                    height: op.required_dimension(args, "height")?,
                    offset_x: op.offset("offset_x", field(args, "offset_x"))?,
                    offset_y: op.offset("offset_y", field(args, "offset_y"))?,
                }));
            }
            "scaleAndCrop" => {
                let args = op.fields()?;
                plan.operations.push(Operation::ScaleAndCrop {
                    width: op.required_dimension(args, "width")?,
                    height: op.required_dimension(args, "height")?,
                });
            }
            "rotate" => {
                let (degrees, _) = op.primary("degrees")?;
                let degrees = degrees
                    .as_f64()
                    .filter(|d| d.is_finite())
                    .ok_or_else(|| op.invalid("degrees", "expected a number"))?;
                plan.operations.push(Operation::Rotate(degrees));
            }
            "flip" => {
                let (direction, _) = op.primary("direction")?;
                let direction = match direction {
                    Value::Text(name) => FlipDirection::from_name(name),
                    other => other.as_i64().and_then(FlipDirection::from_code),
                }
                .ok_or_else(|| op.invalid("direction", "expected horizontal or vertical"))?;
                plan.operations.push(Operation::Flip(direction));
            }
            "sharpen" => {
                let (amount, _) = op.primary("amount")?;
                let amount = amount
                    .as_i64()
                    .filter(|a| (1..=100).contains(a))
                    .ok_or_else(|| op.invalid("amount", "expected an integer 1-100"))?;
                plan.operations.push(Operation::Sharpen(amount as u8));
            }
            "reflection" => {
                let args = op.fields()?;
                plan.operations.push(Operation::Reflection(ReflectionArgs {
                    height: op.optional_dimension(args, "height")?,
                    opacity: op.percent("opacity", field(args, "opacity"), 100)?,
                    fade_in: match field(args, "fade_in") {
                        None => false,
                        Some(v) => v
                            .as_bool()
                            .ok_or_else(|| op.invalid("fade_in", "expected a boolean"))?,
                    },
                }));
            }
            "watermark" => {
                let (mark, args) = op.primary("watermark")?;
                let source = match mark {
                    Value::Image(image) => WatermarkSource::Image(image.clone()),
                    Value::Text(path) => WatermarkSource::Path(path.clone()),
                    other => {
                        return Err(op.invalid(
                            "watermark",
                            &format!("expected an image or a path, got {}", other.kind()),
                        ));
                    }
                };
                plan.operations.push(Operation::Watermark {
                    source,
                    args: WatermarkArgs {
                        offset_x: op.offset("offset_x", field(args, "offset_x"))?,
                        offset_y: op.offset("offset_y", field(args, "offset_y"))?,
                        opacity: op.percent("opacity", field(args, "opacity"), 100)?,
                    },
                });
            }
            "background" => {
                let (color, args) = op.primary("color")?;
                let color = color
                    .as_str()
                    .and_then(Color::from_hex)
                    .ok_or_else(|| op.invalid("color", "expected #rgb or #rrggbb"))?;
                plan.operations.push(Operation::Background(BackgroundArgs {
                    color,
                    opacity: op.percent("opacity", field(args, "opacity"), 100)?,
                }));
            }
            "quality" => {
                let value = op.scalar()?.ok_or_else(|| op.missing("quality"))?;
                plan.quality = Some(Quality(op.percent("quality", Some(value), 100)?));
            }
            "type" => {
                if let Some(value) = op.scalar()? {
                    let ext = value
                        .as_str()
                        .ok_or_else(|| op.invalid("type", "expected a file extension"))?
                        .trim()
                        .trim_start_matches('.')
                        .to_ascii_lowercase();
                    let format = OutputFormat::from_extension(&ext)
                        .ok_or_else(|| ValidationError::UnsupportedFormat(ext.clone()))?;
                    plan.output = Some((ext, format));
                }
            }
            other => return Err(ValidationError::UnknownOperation(other.to_string())),
        }
    }

    Ok(plan)
}

/// Run `plan` against `image`.
///
/// Watermark paths are looked up with [`locate`] against `web_root` and
/// opened through the backend.
pub fn apply<B: ImageBackend + ?Sized>(
    backend: &B,
    image: DynamicImage,
    plan: &Plan,
    web_root: &Path,
) -> Result<DynamicImage, InterpretError> {
    let mut image = image;
    for operation in &plan.operations {
        image = match operation {
            Operation::Resize(args) => backend.resize(image, args)?,
            Operation::Crop(args) => backend.crop(image, args)?,
            Operation::ScaleAndCrop { width, height } => {
                let resized = backend.resize(
                    image,
                    &ResizeArgs {
                        width: Some(*width),
                        height: Some(*height),
                        master: Some(Master::Inverse),
                    },
                )?;
                backend.crop(
                    resized,
                    &CropArgs {
                        width: *width,
                        height: *height,
                        offset_x: Offset::Center,
                        offset_y: Offset::Center,
                    },
                )?
            }
            Operation::Rotate(degrees) => backend.rotate(image, *degrees)?,
            Operation::Flip(direction) => backend.flip(image, *direction)?,
            Operation::Sharpen(amount) => backend.sharpen(image, *amount)?,
            Operation::Reflection(args) => backend.reflection(image, args)?,
            Operation::Watermark { source, args } => match source {
                WatermarkSource::Image(mark) => backend.watermark(image, mark.image(), args)?,
                WatermarkSource::Path(path) => {
                    let mark = backend.open(&locate(web_root, path))?;
                    backend.watermark(image, &mark, args)?
                }
            },
            Operation::Background(args) => backend.background(image, args)?,
        };
    }
    Ok(image)
}

/// [`plan`] then [`apply`].
pub fn interpret<B: ImageBackend + ?Sized>(
    backend: &B,
    image: DynamicImage,
    params: &ParameterMap,
    web_root: &Path,
) -> Result<(DynamicImage, Plan), InterpretError> {
    let plan = plan(params)?;
    let image = apply(backend, image, &plan, web_root)?;
    Ok((image, plan))
}

/// Resolve a public path: under `web_root` if a file exists there,
/// otherwise the path as given.
pub fn locate(web_root: &Path, path: &str) -> PathBuf {
    let under_root = web_root.join(path.trim_start_matches('/'));
    if under_root.is_file() {
        under_root
    } else {
        PathBuf::from(path)
    }
}

fn field<'a>(args: Option<&'a Args>, name: &str) -> Option<&'a Value> {
    args.and_then(|a| a.present(name))
}

/// Argument extraction for one operation, carrying its name for errors.
struct OpParser<'a> {
    name: &'a str,
    param: &'a Param,
}

impl<'a> OpParser<'a> {
    fn missing(&self, field: &str) -> ValidationError {
        ValidationError::MissingField {
            operation: self.name.to_string(),
            field: field.to_string(),
        }
    }

    fn invalid(&self, field: &str, reason: &str) -> ValidationError {
        ValidationError::InvalidValue {
            operation: self.name.to_string(),
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Structured-only operations. A bare null means "no arguments".
    fn fields(&self) -> Result<Option<&'a Args>, ValidationError> {
        match self.param {
            Param::Structured(args) => Ok(Some(args)),
            Param::Scalar(Value::Null) => Ok(None),
            Param::Scalar(_) => Err(self.invalid("arguments", "expected named arguments")),
        }
    }

    /// Scalar-only operations. `None` for a null.
    fn scalar(&self) -> Result<Option<&'a Value>, ValidationError> {
        match self.param {
            Param::Scalar(Value::Null) => Ok(None),
            Param::Scalar(value) => Ok(Some(value)),
            Param::Structured(_) => Err(self.invalid(self.name, "expected a bare value")),
        }
    }

    /// Dual-form operations: the bare value, or the mandatory `primary`
    /// field of the structured form plus the remaining arguments.
    fn primary(&self, primary: &str) -> Result<(&'a Value, Option<&'a Args>), ValidationError> {
        match self.param {
            Param::Scalar(Value::Null) => Err(self.missing(primary)),
            Param::Scalar(value) => Ok((value, None)),
            Param::Structured(args) => args
                .present(primary)
                .map(|value| (value, Some(args)))
                .ok_or_else(|| self.missing(primary)),
        }
    }

    fn dimension(&self, name: &str, value: &Value) -> Result<u32, ValidationError> {
        let n = value
            .as_i64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| self.invalid(name, "expected a non-negative integer"))?;
        if n > MAX_DIMENSION {
            return Err(self.invalid(name, "exceeds the maximum of 65535 pixels"));
        }
        Ok(n)
    }

    fn optional_dimension(
        &self,
        args: Option<&Args>,
        name: &str,
    ) -> Result<Option<u32>, ValidationError> {
        field(args, name)
            .map(|value| self.dimension(name, value))
            .transpose()
    }

    fn required_dimension(&self, args: Option<&Args>, name: &str) -> Result<u32, ValidationError> {
        let value = field(args, name).ok_or_else(|| self.missing(name))?;
        self.dimension(name, value)
    }

    fn master(&self, value: Option<&Value>) -> Result<Option<Master>, ValidationError> {
        let Some(value) = value else {
            return Ok(None);
        };
        match value {
            Value::Text(name) => Master::from_name(name),
            other => other.as_i64().and_then(Master::from_code),
        }
        .map(Some)
        .ok_or_else(|| self.invalid("master", "expected a master code 1-6 or name"))
    }

    fn offset(&self, name: &str, value: Option<&Value>) -> Result<Offset, ValidationError> {
        match value {
            None => Ok(Offset::Center),
            Some(Value::Bool(true)) => Ok(Offset::End),
            Some(Value::Bool(false)) => Ok(Offset::Pixels(0)),
            Some(other) => {
                let n = other
                    .as_i64()
                    .ok_or_else(|| self.invalid(name, "expected an integer, true or null"))?;
                i32::try_from(n)
                    .map(|n| Offset::Pixels(n.into()))
                    .map_err(|_| self.invalid(name, "out of range"))
            }
        }
    }

    fn percent(&self, name: &str, value: Option<&Value>, default: u8) -> Result<u8, ValidationError> {
        let Some(value) = value else {
            return Ok(default);
        };
        value
            .as_i64()
            .filter(|n| (0..=100).contains(n))
            .map(|n| n as u8)
            .ok_or_else(|| self.invalid(name, "expected an integer 0-100"))
    }
}
