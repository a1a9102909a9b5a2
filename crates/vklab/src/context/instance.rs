use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use ash::vk;
use const_cstr::const_cstr;
use raw_window_handle::HasDisplayHandle;

use crate::context::PhysicalDeviceFilter;
use crate::error::InstanceError;

const_cstr! {
    UNKNOWNID = "unknown id";
    NOMSG = "no message";
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let callback_data = *p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        UNKNOWNID.as_cstr()
    } else {
        CStr::from_ptr(callback_data.p_message_id_name)
    };
    let message = if callback_data.p_message.is_null() {
        NOMSG.as_cstr()
    } else {
        CStr::from_ptr(callback_data.p_message)
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[{:?}] {:?}: {:?}", message_type, message_id_name, message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[{:?}] {:?}: {:?}", message_type, message_id_name, message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::info!("[{:?}] {:?}: {:?}", message_type, message_id_name, message)
        }
        _ => log::trace!("[{:?}] {:?}: {:?}", message_type, message_id_name, message),
    }

    vk::FALSE
}

///Owns the debug utils messenger that forwards validation messages into
/// [log].
pub struct Debugger {
    pub debug_instance: ash::ext::debug_utils::Instance,
    pub messenger: vk::DebugUtilsMessengerEXT,
}

impl Debugger {
    fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self, vk::Result> {
        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));

        let debug_instance = ash::ext::debug_utils::Instance::new(entry, instance);
        let messenger =
            unsafe { debug_instance.create_debug_utils_messenger(&debug_info, None)? };

        Ok(Debugger {
            debug_instance,
            messenger,
        })
    }
}

impl Drop for Debugger {
    fn drop(&mut self) {
        unsafe {
            self.debug_instance
                .destroy_debug_utils_messenger(self.messenger, None)
        };
    }
}

///Assembles the layers and extensions an [Instance] is created with. The
/// available sets are cached once when the library is loaded, every
/// `with_*` call checks against them before enabling anything.
pub struct InstanceBuilder {
    pub entry: ash::Entry,
    ///If set, [build](Self::build) enables the Khronos validation layer and
    /// installs a messenger that forwards validation output into [log].
    pub with_validation: bool,
    pub enabled_layers: Vec<CString>,
    pub enabled_extensions: Vec<CString>,
    available_layers: Vec<vk::LayerProperties>,
    available_extensions: Vec<vk::ExtensionProperties>,
}

impl InstanceBuilder {
    fn new(entry: ash::Entry) -> Result<Self, InstanceError> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
        let available_extensions =
            unsafe { entry.enumerate_instance_extension_properties(None)? };

        Ok(InstanceBuilder {
            entry,
            with_validation: false,
            enabled_layers: Vec::new(),
            enabled_extensions: Vec::new(),
            available_layers,
            available_extensions,
        })
    }

    pub fn is_layer_available(&self, layer: &CStr) -> bool {
        self.available_layers.iter().any(|properties| {
            CStr::from_bytes_until_nul(bytemuck::cast_slice(properties.layer_name.as_slice()))
                == Ok(layer)
        })
    }

    pub fn is_extension_available(&self, extension: &CStr) -> bool {
        self.available_extensions.iter().any(|properties| {
            CStr::from_bytes_until_nul(bytemuck::cast_slice(properties.extension_name.as_slice()))
                == Ok(extension)
        })
    }

    pub fn with_layer(mut self, layer: CString) -> Result<Self, InstanceError> {
        if !self.is_layer_available(&layer) {
            return Err(InstanceError::MissingLayer(layer));
        }
        if self.enabled_layers.contains(&layer) {
            log::warn!("Layer {:?} was already enabled", layer);
        } else {
            self.enabled_layers.push(layer);
        }
        Ok(self)
    }

    pub fn with_extension(mut self, extension: CString) -> Result<Self, InstanceError> {
        if !self.is_extension_available(&extension) {
            return Err(InstanceError::MissingExtension(extension));
        }
        if self.enabled_extensions.contains(&extension) {
            log::warn!("Extension {:?} was already enabled", extension);
        } else {
            self.enabled_extensions.push(extension);
        }
        Ok(self)
    }

    ///Enables every instance extension the windowing system needs before a
    /// surface can be created for `window`.
    pub fn for_surface(self, window: &dyn HasDisplayHandle) -> Result<Self, InstanceError> {
        let required =
            ash_window::enumerate_required_extensions(window.display_handle()?.as_raw())?;

        let mut builder = self;
        for extension in required {
            let extension = unsafe { CStr::from_ptr(*extension) }.to_owned();
            builder = builder.with_extension(extension)?;
        }
        Ok(builder)
    }

    pub fn enable_validation(mut self) -> Self {
        self.with_validation = true;
        self
    }

    pub fn build(self) -> Result<Arc<Instance>, InstanceError> {
        let mut builder = self;
        if builder.with_validation {
            builder =
                builder.with_layer(CString::new("VK_LAYER_KHRONOS_validation").unwrap())?;
            builder = builder.with_extension(ash::ext::debug_utils::NAME.to_owned())?;
        }

        log::info!(
            "Creating instance with layers {:?} and extensions {:?}",
            builder.enabled_layers,
            builder.enabled_extensions
        );

        let layer_names: Vec<*const c_char> = builder
            .enabled_layers
            .iter()
            .map(|layer| layer.as_ptr())
            .collect();
        let extension_names: Vec<*const c_char> = builder
            .enabled_extensions
            .iter()
            .map(|extension| extension.as_ptr())
            .collect();

        let app_name = CString::new("vklab").unwrap();
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&app_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(Instance::api_version());

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        let instance = unsafe { builder.entry.create_instance(&create_info, None)? };

        let debugger = if builder.with_validation {
            match Debugger::new(&builder.entry, &instance) {
                Ok(debugger) => Some(debugger),
                Err(error) => {
                    log::error!("Could not install the debug messenger: {}", error);
                    None
                }
            }
        } else {
            None
        };

        Ok(Arc::new(Instance {
            entry: builder.entry,
            inner: instance,
            debugger,
        }))
    }
}

///A created Vulkan instance. Obtained through [Instance::load], which yields
/// an [InstanceBuilder] that can be refined before the actual creation.
pub struct Instance {
    pub entry: ash::Entry,
    pub inner: ash::Instance,
    ///Present while validation is enabled.
    debugger: Option<Debugger>,
}

impl Instance {
    pub const API_VERSION_MAJOR: u32 = 1;
    pub const API_VERSION_MINOR: u32 = 2;
    pub const API_VERSION_PATCH: u32 = 0;

    ///Vulkan api version instances of this crate are created with.
    pub fn api_version() -> u32 {
        vk::make_api_version(
            0,
            Self::API_VERSION_MAJOR,
            Self::API_VERSION_MINOR,
            Self::API_VERSION_PATCH,
        )
    }

    ///Loads the Vulkan library at runtime and starts building an instance.
    pub fn load() -> Result<InstanceBuilder, InstanceError> {
        let entry = unsafe { ash::Entry::load()? };
        InstanceBuilder::new(entry)
    }

    pub fn validation_enabled(&self) -> bool {
        self.debugger.is_some()
    }

    ///Starts selecting one of the instance's physical devices.
    pub fn create_physical_device_filter(&self) -> Result<PhysicalDeviceFilter, InstanceError> {
        let pdevices = unsafe { self.inner.enumerate_physical_devices()? };
        Ok(PhysicalDeviceFilter::new(&self.inner, pdevices))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        //the messenger must go before the instance it was created on
        self.debugger.take();
        unsafe { self.inner.destroy_instance(None) };
    }
}
