//! TemplateMatcher: responsibility and boundaries
//!
//! Scores a captured image against the reference templates with zero-mean
//! normalized cross-correlation (ZNCC) on 8-bit luma and returns the single best
//! candidate. It knows nothing about thresholds, cooldowns or windows: the caller
//! compares the score against `confidence_threshold`.

use crate::error::{AppError, Result};
use image::DynamicImage;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Поддерживаемые расширения эталонных изображений
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Максимальное число шагов уменьшения пирамиды
const MAX_PYRAMID_LEVELS: usize = 3;
/// Минимальная сторона шаблона на грубом уровне (для уменьшаемой оси)
const MIN_COARSE_SIDE: usize = 8;
/// Грубый уровень строится, только если сохраняет эту долю контраста шаблона
const MIN_DETAIL_RATIO: f64 = 0.6;
/// Сколько кандидатов грубого поиска уточняется на полном разрешении
const COARSE_CANDIDATES: usize = 5;
/// Ниже этого счёта грубого уровня результат перепроверяется полным перебором
const COARSE_VERIFY_SCORE: f64 = 0.4;

/// Коэффициенты уменьшения по осям (x, y)
type Scale = (usize, usize);

const FULL_SCALE: Scale = (1, 1);

/// Полутоновое изображение 8 бит
#[derive(Debug, Clone)]
struct Plane {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Plane {
    fn from_image(image: &DynamicImage) -> Self {
        let gray = image.to_luma8();
        Self {
            width: gray.width() as usize,
            height: gray.height() as usize,
            pixels: gray.into_raw(),
        }
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    /// Уменьшение усреднением блоков fx×fy
    fn shrink(&self, (fx, fy): Scale) -> Plane {
        let width = self.width / fx;
        let height = self.height / fy;
        let area = (fx * fy) as u32;
        let mut pixels = Vec::with_capacity(width * height);

        for y in 0..height {
            for x in 0..width {
                let mut sum = 0u32;
                for dy in 0..fy {
                    for dx in 0..fx {
                        sum += self.at(x * fx + dx, y * fy + dy) as u32;
                    }
                }
                pixels.push(((sum + area / 2) / area) as u8);
            }
        }

        Plane { width, height, pixels }
    }
}

/// Интегральные суммы яркости и её квадрата; целочисленные, поэтому точные
struct Integral {
    stride: usize,
    sum: Vec<u64>,
    sq: Vec<u64>,
}

impl Integral {
    fn new(plane: &Plane) -> Self {
        let stride = plane.width + 1;
        let mut sum = vec![0u64; stride * (plane.height + 1)];
        let mut sq = vec![0u64; stride * (plane.height + 1)];

        for y in 0..plane.height {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..plane.width {
                let v = plane.at(x, y) as u64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                sq[idx] = sq[idx - stride] + row_sq;
            }
        }

        Self { stride, sum, sq }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (u64, u64) {
        let a = y * self.stride + x;
        let b = y * self.stride + x + w;
        let c = (y + h) * self.stride + x;
        let d = (y + h) * self.stride + x + w;
        (
            self.sum[d] + self.sum[a] - self.sum[b] - self.sum[c],
            self.sq[d] + self.sq[a] - self.sq[b] - self.sq[c],
        )
    }
}

/// Один уровень пирамиды шаблона: значения за вычетом среднего и их норма
#[derive(Debug, Clone)]
struct TemplateLevel {
    scale: Scale,
    width: usize,
    height: usize,
    zero_mean: Vec<f64>,
    norm: f64,
}

impl TemplateLevel {
    fn new(plane: &Plane, scale: Scale) -> Self {
        let n = plane.pixels.len().max(1) as f64;
        let mean = plane.pixels.iter().map(|&p| p as f64).sum::<f64>() / n;
        let zero_mean: Vec<f64> = plane.pixels.iter().map(|&p| p as f64 - mean).collect();
        let norm = zero_mean.iter().map(|v| v * v).sum::<f64>().sqrt();

        Self {
            scale,
            width: plane.width,
            height: plane.height,
            zero_mean,
            norm,
        }
    }

    /// Контраст на пиксель, сравним между уровнями
    fn rms(&self) -> f64 {
        self.norm / ((self.width * self.height).max(1) as f64).sqrt()
    }
}

/// Уменьшаемая ось не должна стать короче MIN_COARSE_SIDE
fn fits_coarse(side: usize, current: usize, next: usize) -> bool {
    next == current || side / next >= MIN_COARSE_SIDE
}

/// Эталонное изображение кнопки подтверждения
#[derive(Debug, Clone)]
pub struct ReferenceTemplate {
    id: usize,
    name: String,
    levels: Vec<TemplateLevel>,
}

impl ReferenceTemplate {
    /// Уровни строятся по обеим осям или только по одной: тонкие и вытянутые
    /// шаблоны уменьшаются вдоль длинной стороны. Уровень, потерявший детали
    /// (например, штрихи шириной в пиксель), не строится.
    pub fn from_image(id: usize, name: impl Into<String>, image: &DynamicImage) -> Self {
        let plane = Plane::from_image(image);
        let full = TemplateLevel::new(&plane, FULL_SCALE);
        let detail = full.rms();
        let mut levels = vec![full];

        while levels.len() <= MAX_PYRAMID_LEVELS {
            let (sx, sy) = levels[levels.len() - 1].scale;
            let next = [(sx * 2, sy * 2), (sx * 2, sy), (sx, sy * 2)]
                .into_iter()
                .filter(|&(fx, fy)| {
                    fits_coarse(plane.width, sx, fx) && fits_coarse(plane.height, sy, fy)
                })
                .map(|scale| TemplateLevel::new(&plane.shrink(scale), scale))
                .find(|level| detail > 0.0 && level.rms() >= MIN_DETAIL_RATIO * detail);

            match next {
                Some(level) => levels.push(level),
                None => break,
            }
        }

        Self {
            id,
            name: name.into(),
            levels,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width as u32
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height as u32
    }

    /// Однотонный шаблон не коррелирует ни с чем
    fn is_flat(&self) -> bool {
        self.levels[0].norm == 0.0
    }
}

/// Непустой набор эталонов, загружается один раз при старте
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: Vec<ReferenceTemplate>,
}

impl TemplateSet {
    pub fn new(templates: Vec<ReferenceTemplate>) -> Result<Self> {
        if templates.is_empty() {
            return Err(AppError::TemplateLoad(
                "нет ни одного пригодного эталонного изображения".to_string(),
            ));
        }
        Ok(Self { templates })
    }

    /// Загрузка всех изображений каталога в порядке сортировки путей
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            AppError::TemplateLoad(format!("не удалось прочитать каталог {:?}: {}", dir, e))
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let image = match image::open(&path) {
                Ok(image) => image,
                Err(e) => {
                    warn!("Пропускаем эталон {}: {}", name, e);
                    continue;
                }
            };

            if image.width() == 0 || image.height() == 0 {
                warn!("Пропускаем пустой эталон {}", name);
                continue;
            }

            let template = ReferenceTemplate::from_image(templates.len(), name, &image);
            if template.is_flat() {
                warn!("Пропускаем однотонный эталон {}", template.name());
                continue;
            }

            info!(
                "Загружен эталон #{} {} ({}x{})",
                template.id(),
                template.name(),
                template.width(),
                template.height()
            );
            templates.push(template);
        }

        Self::new(templates)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceTemplate> {
        self.templates.iter()
    }

    pub fn get(&self, id: usize) -> Option<&ReferenceTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }
}

pub(crate) fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Лучшее совпадение за тик. Не сохраняется.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub template_id: usize,
    /// Сходство в диапазоне [0, 1]
    pub score: f64,
    /// Левый верхний угол совпадения относительно снимка
    pub location: (u32, u32),
}

impl MatchResult {
    pub fn meets(&self, threshold: f64) -> bool {
        meets_threshold(self.score, threshold)
    }
}

/// Граница порога включительная
pub fn meets_threshold(score: f64, threshold: f64) -> bool {
    score >= threshold
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    x: usize,
    y: usize,
}

impl Candidate {
    const NONE: Candidate = Candidate {
        score: f64::NEG_INFINITY,
        x: usize::MAX,
        y: usize::MAX,
    };

    /// Выше счёт, при равенстве верхняя, затем левая позиция
    fn beats(&self, other: &Candidate) -> bool {
        match self.score.partial_cmp(&other.score) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => (self.y, self.x) < (other.y, other.x),
            _ => false,
        }
    }
}

/// Снимок в одном масштабе вместе с интегральными суммами
struct ScaledImage {
    plane: Plane,
    integral: Integral,
}

impl ScaledImage {
    fn new(plane: Plane) -> Self {
        let integral = Integral::new(&plane);
        Self { plane, integral }
    }
}

/// Уменьшенные копии снимка строятся по запросу и переиспользуются всеми шаблонами
struct ImagePyramid {
    full: ScaledImage,
    scaled: HashMap<Scale, ScaledImage>,
}

impl ImagePyramid {
    fn new(image: &DynamicImage) -> Self {
        Self {
            full: ScaledImage::new(Plane::from_image(image)),
            scaled: HashMap::new(),
        }
    }

    fn width(&self) -> usize {
        self.full.plane.width
    }

    fn height(&self) -> usize {
        self.full.plane.height
    }

    fn at_scale(&mut self, scale: Scale) -> &ScaledImage {
        if scale == FULL_SCALE {
            return &self.full;
        }
        let full = &self.full.plane;
        self.scaled
            .entry(scale)
            .or_insert_with(|| ScaledImage::new(full.shrink(scale)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMatcher;

impl TemplateMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Лучший кандидат по всем шаблонам, даже ниже порога.
    /// При точном равенстве счёта выигрывает меньший идентификатор шаблона.
    pub fn best_match(&self, image: &DynamicImage, templates: &TemplateSet) -> MatchResult {
        let mut pyramid = ImagePyramid::new(image);

        let mut best: Option<MatchResult> = None;
        for template in templates.iter() {
            let Some(candidate) = self.match_template(&mut pyramid, template) else {
                debug!(
                    "Эталон {} больше области сканирования, пропускаем",
                    template.name()
                );
                continue;
            };

            let result = MatchResult {
                template_id: template.id(),
                score: candidate.score,
                location: (candidate.x as u32, candidate.y as u32),
            };

            let replace = match &best {
                None => true,
                Some(current) => {
                    result.score > current.score
                        || (result.score == current.score
                            && result.template_id < current.template_id)
                }
            };
            if replace {
                best = Some(result);
            }
        }

        best.unwrap_or(MatchResult {
            template_id: templates.iter().map(|t| t.id()).min().unwrap_or(0),
            score: 0.0,
            location: (0, 0),
        })
    }

    fn match_template(
        &self,
        pyramid: &mut ImagePyramid,
        template: &ReferenceTemplate,
    ) -> Option<Candidate> {
        let full = &template.levels[0];
        let (width, height) = (pyramid.width(), pyramid.height());
        if full.width > width || full.height > height {
            return None;
        }
        let max_x = width - full.width;
        let max_y = height - full.height;

        // Самый грубый уровень, который помещается в уменьшенный снимок
        let coarse_level = template.levels[1..].iter().rev().find(|level| {
            level.width <= width / level.scale.0 && level.height <= height / level.scale.1
        });

        let exhaustive = |pyramid: &ImagePyramid| {
            search(
                &pyramid.full.plane,
                &pyramid.full.integral,
                full,
                0..=max_x,
                0..=max_y,
            )
        };

        let Some(level) = coarse_level else {
            return Some(exhaustive(&*pyramid));
        };

        let coarse = {
            let scaled = pyramid.at_scale(level.scale);
            coarse_candidates(&scaled.plane, &scaled.integral, level)
        };
        let coarse_best = coarse.first().map(|c| c.score).unwrap_or(0.0);

        let (sx, sy) = level.scale;
        let mut best = Candidate::NONE;
        for candidate in coarse {
            let cx = candidate.x * sx;
            let cy = candidate.y * sy;
            let (mx, my) = (2 * sx + 2, 2 * sy + 2);
            let xs = cx.saturating_sub(mx).min(max_x)..=(cx + mx).min(max_x);
            let ys = cy.saturating_sub(my).min(max_y)..=(cy + my).min(max_y);

            let refined = search(&pyramid.full.plane, &pyramid.full.integral, full, xs, ys);
            if refined.beats(&best) {
                best = refined;
            }
        }

        // Слабое грубое совпадение не гарантирует, что максимум не пропущен
        if coarse_best < COARSE_VERIFY_SCORE {
            let checked = exhaustive(&*pyramid);
            if checked.beats(&best) {
                best = checked;
            }
        }

        Some(best)
    }
}

/// Полный перебор позиций в заданных диапазонах
fn search(
    image: &Plane,
    integral: &Integral,
    template: &TemplateLevel,
    xs: std::ops::RangeInclusive<usize>,
    ys: std::ops::RangeInclusive<usize>,
) -> Candidate {
    let mut best = Candidate::NONE;
    for y in ys {
        for x in xs.clone() {
            let candidate = Candidate {
                score: zncc(image, integral, template, x, y),
                x,
                y,
            };
            if candidate.beats(&best) {
                best = candidate;
            }
        }
    }
    best
}

/// Лучшие разнесённые позиции грубого уровня
fn coarse_candidates(image: &Plane, integral: &Integral, template: &TemplateLevel) -> Vec<Candidate> {
    let mut all = Vec::with_capacity(
        (image.width - template.width + 1) * (image.height - template.height + 1),
    );
    for y in 0..=image.height - template.height {
        for x in 0..=image.width - template.width {
            all.push(Candidate {
                score: zncc(image, integral, template, x, y),
                x,
                y,
            });
        }
    }

    all.sort_by(|a, b| {
        if a.beats(b) {
            Ordering::Less
        } else if b.beats(a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });

    let min_dx = (template.width / 2).max(1);
    let min_dy = (template.height / 2).max(1);
    let mut picked: Vec<Candidate> = Vec::with_capacity(COARSE_CANDIDATES);
    for candidate in all {
        let separated = picked
            .iter()
            .all(|p| p.x.abs_diff(candidate.x) >= min_dx || p.y.abs_diff(candidate.y) >= min_dy);
        if separated {
            picked.push(candidate);
            if picked.len() == COARSE_CANDIDATES {
                break;
            }
        }
    }
    picked
}

/// ZNCC в позиции (x, y), отрицательная корреляция обрезается до 0
fn zncc(image: &Plane, integral: &Integral, template: &TemplateLevel, x: usize, y: usize) -> f64 {
    if template.norm == 0.0 {
        return 0.0;
    }

    let n = (template.width * template.height) as u128;
    let (sum, sq) = integral.window(x, y, template.width, template.height);
    let variance_n = n * sq as u128 - (sum as u128) * (sum as u128);
    if variance_n == 0 {
        return 0.0;
    }
    let window_norm = (variance_n as f64 / n as f64).sqrt();

    let mut cross = 0.0f64;
    for j in 0..template.height {
        let row = &image.pixels[(y + j) * image.width + x..(y + j) * image.width + x + template.width];
        let tpl_row = &template.zero_mean[j * template.width..(j + 1) * template.width];
        for (t, &p) in tpl_row.iter().zip(row) {
            cross += t * p as f64;
        }
    }

    (cross / (template.norm * window_norm)).clamp(0.0, 1.0)
}
