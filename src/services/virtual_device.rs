use crate::error::{AppError, Result};
use crate::events::{KeyCode, KeyState, VirtualKeyEvent};
use tracing::{debug, info};

const EV_SYN: i32 = 0;
const EV_KEY: i32 = 1;
const SYN_REPORT: i32 = 0;

pub struct VirtualDevice {
    device: Option<uinput::Device>,
    device_name: String,
    dry_run: bool,
}

impl VirtualDevice {
    pub fn new(device_name: &str, dry_run: bool) -> Result<Self> {
        info!("Инициализация VirtualDevice '{}' (dry_run: {})", device_name, dry_run);

        let device = if dry_run {
            None
        } else {
            Some(Self::create_virtual_device(device_name)?)
        };

        Ok(Self {
            device,
            device_name: device_name.to_string(),
            dry_run,
        })
    }

    fn create_virtual_device(device_name: &str) -> Result<uinput::Device> {
        info!("Создание виртуального устройства uinput '{}' для инъекции клавиш", device_name);

        let virtual_device = uinput::default()?
            .name(device_name)?
            .event(uinput::event::Keyboard::All)?
            .create()
            .map_err(|e| {
                AppError::Permission(format!(
                    "Не удалось создать виртуальное устройство '{}': {}",
                    device_name, e
                ))
            })?;

        info!("Виртуальное устройство '{}' создано успешно", device_name);
        Ok(virtual_device)
    }

    pub fn send_event(&mut self, event: VirtualKeyEvent) -> Result<()> {
        if self.dry_run {
            info!("[DRY RUN] Виртуальное событие: {:?}", event);
            return Ok(());
        }

        debug!("Обработка виртуального события: {:?}", event);

        let Some(device) = &mut self.device else {
            return Err(AppError::InputInjection("Виртуальное устройство недоступно".to_string()));
        };

        let keycode = event.key_code.value() as i32;
        let value = match event.state {
            KeyState::Pressed => 1,
            KeyState::Released => 0,
        };

        // Отправляем событие клавиши
        device.write(EV_KEY, keycode, value).map_err(|e| {
            AppError::InputInjection(format!("Не удалось отправить событие клавиши {}: {}", keycode, e))
        })?;

        // Синхронизируем события
        device.write(EV_SYN, SYN_REPORT, 0).map_err(|e| {
            AppError::InputInjection(format!("Не удалось синхронизировать события: {}", e))
        })?;

        debug!("Виртуальное событие {} отправлено", event.key_code);
        Ok(())
    }

    /// Нажатие и отпускание; отпускание отправляется даже после сбоя нажатия
    pub fn tap(&mut self, key_code: KeyCode) -> Result<()> {
        let pressed = self.send_event(VirtualKeyEvent::press(key_code));
        let released = self.send_event(VirtualKeyEvent::release(key_code));
        pressed.and(released)
    }

    pub fn name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        if !self.dry_run {
            info!("Закрытие виртуального устройства '{}'", self.device_name);
        }
    }
}
