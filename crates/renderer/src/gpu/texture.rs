use std::rc::Rc;

use crate::driver::{Filter, SamplerId, TextureId};
use crate::error::{NovaError, Result};
use crate::palette::ColorEntry;

use super::session::{GpuSession, Owned};

/// Texture unit the fragment shaders sample the palette from.
pub const PALETTE_UNIT: u32 = 0;

/// Palette lookup texture: one row of RGBA8 texels plus its sampler.
pub struct Texture {
    texture: Owned<TextureId>,
    sampler: Owned<SamplerId>,
    width: u32,
    filtering: bool,
    bound: bool,
}

impl Texture {
    pub fn create(session: &Rc<GpuSession>, colors: &[ColorEntry], filtering: bool) -> Result<Self> {
        if colors.is_empty() {
            return Err(NovaError::InvalidPalette(
                "cannot create a texture from an empty color sequence".to_string(),
            ));
        }
        let width = u32::try_from(colors.len()).map_err(|_| {
            NovaError::InvalidPalette(format!("{} colors exceed texture width", colors.len()))
        })?;

        let created = session.driver().create_texture(width, 1);
        let texture = Owned::new(
            session,
            session.check_alloc(created, "failed to create texture")?,
        );
        let updated = session
            .driver()
            .update_texture_image(texture.handle(), bytemuck::cast_slice(colors));
        session.check(updated, "failed to update texture image")?;

        let created = session.driver().create_sampler();
        let sampler = Owned::new(
            session,
            session.check_alloc(created, "failed to create texture sampler")?,
        );

        let mut palette = Self {
            texture,
            sampler,
            width,
            filtering,
            bound: false,
        };
        palette.apply_filter()?;

        let binding = (palette.texture.handle(), palette.sampler.handle());
        let result = session.driver().bind_texture(PALETTE_UNIT, Some(binding));
        session.check(result, "failed to bind texture")?;
        palette.bound = true;

        tracing::debug!(
            texture = %palette.texture.handle(),
            width,
            filtering,
            "created palette texture"
        );
        Ok(palette)
    }

    /// Switches between linear and nearest sampling.
    pub fn set_filtering(&mut self, enabled: bool) -> Result<()> {
        self.filtering = enabled;
        self.apply_filter()
    }

    pub fn filtering(&self) -> bool {
        self.filtering
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn handle(&self) -> TextureId {
        self.texture.handle()
    }

    fn apply_filter(&self) -> Result<()> {
        let filter = if self.filtering {
            Filter::Linear
        } else {
            Filter::Nearest
        };
        let session = self.sampler.session();
        let result = session
            .driver()
            .set_sampler_filter(self.sampler.handle(), filter, filter);
        session.check(result, "failed to set texture sampler filter")
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if self.bound {
            let session = self.texture.session();
            let result = session.driver().bind_texture(PALETTE_UNIT, None);
            session.warn_on_error(result, "unbind texture");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::recording::{CallKind, CallLog, DriverCall, RecordingDriver};
    use crate::driver::ErrorCode;
    use crate::palette::ColorPalette;
    use crate::types::PaletteKind;

    fn rainbow() -> Vec<ColorEntry> {
        ColorPalette::preset(PaletteKind::Rainbow, 1024)
            .colors()
            .expect("palette")
    }

    #[test]
    fn uploads_one_row_and_binds_unit_zero() {
        let log = CallLog::new();
        let session = GpuSession::open(Box::new(RecordingDriver::new(log.clone())));
        let colors = rainbow();
        let texture = Texture::create(&session, &colors, true).expect("texture");

        let calls = log.calls();
        assert!(calls.contains(&DriverCall::CreateTexture {
            width: colors.len() as u32,
            height: 1,
        }));
        assert!(calls.contains(&DriverCall::UpdateTextureImage {
            texture: texture.handle(),
            len: colors.len() * 4,
        }));
        assert_eq!(log.count(CallKind::BindTexture), 1);
        assert!(texture.filtering());
    }

    #[test]
    fn set_filtering_reconfigures_sampler_only() {
        let log = CallLog::new();
        let session = GpuSession::open(Box::new(RecordingDriver::new(log.clone())));
        let mut texture = Texture::create(&session, &rainbow(), true).expect("texture");
        log.clear();

        texture.set_filtering(false).expect("filter");
        let calls = log.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            calls[0],
            DriverCall::SetSamplerFilter {
                min: Filter::Nearest,
                mag: Filter::Nearest,
                ..
            }
        ));
    }

    #[test]
    fn drop_unbinds_then_destroys_texture_before_sampler() {
        let log = CallLog::new();
        let session = GpuSession::open(Box::new(RecordingDriver::new(log.clone())));
        let texture = Texture::create(&session, &rainbow(), false).expect("texture");
        log.clear();
        drop(texture);

        assert_eq!(
            log.kinds(),
            vec![
                CallKind::BindTexture,
                CallKind::DestroyTexture,
                CallKind::DestroySampler,
            ]
        );
        assert!(log.violations().is_empty());
    }

    #[test]
    fn rejects_empty_colors() {
        let session = GpuSession::open(Box::new(RecordingDriver::new(CallLog::new())));
        assert!(matches!(
            Texture::create(&session, &[], true),
            Err(NovaError::InvalidPalette(_))
        ));
    }

    #[test]
    fn sampler_failure_releases_texture() {
        let log = CallLog::new();
        let driver = RecordingDriver::new(log.clone())
            .fail_on(CallKind::CreateSampler, ErrorCode::OutOfMemory);
        let session = GpuSession::open(Box::new(driver));

        let err = Texture::create(&session, &rainbow(), true).err().expect("failure");
        assert!(matches!(err, NovaError::ResourceAllocation { .. }));
        assert!(log.live_objects().is_empty());
    }
}
